//! Pluggable optimal solver abstraction

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::{HeldKarpSolver, PragmaticSolver, RoutingProblem, SolverConfig};

/// Why the optimal strategy did not produce an order.
///
/// Every variant triggers the nearest-neighbor fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("no optimal solver is configured")]
    Unavailable,

    #[error("solver exceeded its time limit of {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("{stops} stops exceed the solver limit of {limit}")]
    ProblemTooLarge { stops: usize, limit: usize },

    #[error("solver returned an invalid order: {0}")]
    InvalidPermutation(String),

    #[error("solver failed: {0}")]
    Failed(String),
}

/// Combinatorial solver for a single open route.
pub trait RouteSolver: Send + Sync {
    /// Returns matrix indices `1..=problem.stop_count()` in visiting order.
    /// Index 0 is the start point and is not part of the result.
    fn solve(&self, problem: &RoutingProblem) -> Result<Vec<usize>, SolverError>;

    /// Get solver name for logging
    fn name(&self) -> &str;
}

/// Check that `order` visits every stop index `1..=stop_count` exactly once
pub fn verify_permutation(order: &[usize], stop_count: usize) -> Result<(), String> {
    if order.len() != stop_count {
        return Err(format!("expected {} stops, got {}", stop_count, order.len()));
    }

    let mut seen = vec![false; stop_count + 1];
    for &idx in order {
        if idx == 0 || idx > stop_count {
            return Err(format!("index {} is out of range", idx));
        }
        if seen[idx] {
            return Err(format!("index {} appears twice", idx));
        }
        seen[idx] = true;
    }

    Ok(())
}

/// Exact solver for small itineraries, metaheuristic above that.
/// Both honour time windows and service durations.
pub struct AutoSolver {
    exact: HeldKarpSolver,
    pragmatic: PragmaticSolver,
}

impl AutoSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            exact: HeldKarpSolver::new(config.exact_stop_limit),
            pragmatic: PragmaticSolver::new(config),
        }
    }
}

impl RouteSolver for AutoSolver {
    fn solve(&self, problem: &RoutingProblem) -> Result<Vec<usize>, SolverError> {
        if problem.stop_count() <= self.exact.max_stops() {
            self.exact.solve(problem)
        } else {
            self.pragmatic.solve(problem)
        }
    }

    fn name(&self) -> &str {
        "auto"
    }
}

/// Which optimal solver backs the `optimal` algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SolverBackend {
    #[default]
    Auto,
    Exact,
    Pragmatic,
    /// Optimal requests always fall back to nearest-neighbor
    None,
}

impl FromStr for SolverBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(SolverBackend::Auto),
            "exact" | "held-karp" => Ok(SolverBackend::Exact),
            "pragmatic" | "vrp-pragmatic" => Ok(SolverBackend::Pragmatic),
            "none" | "off" => Ok(SolverBackend::None),
            other => Err(format!("unknown solver backend '{}'", other)),
        }
    }
}

/// Create solver based on configuration
pub fn create_solver(backend: SolverBackend, config: &SolverConfig) -> Option<Arc<dyn RouteSolver>> {
    match backend {
        SolverBackend::Auto => Some(Arc::new(AutoSolver::new(config.clone()))),
        SolverBackend::Exact => Some(Arc::new(HeldKarpSolver::new(config.exact_stop_limit))),
        SolverBackend::Pragmatic => Some(Arc::new(PragmaticSolver::new(config.clone()))),
        SolverBackend::None => None,
    }
}
