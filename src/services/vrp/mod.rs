//! Route sequencing
//!
//! Orders an itinerary's stops either with the nearest-neighbor heuristic or
//! with a pluggable optimal solver. Solver failures never fail the request:
//! they are recorded as a fallback reason and the heuristic runs instead.

mod adapter;
mod config;
mod exact;
mod pragmatic;
mod problem;
mod solver;

pub use adapter::{build_pragmatic_matrix, build_pragmatic_problem, DEFAULT_PROFILE};
pub use config::SolverConfig;
pub use exact::HeldKarpSolver;
pub use pragmatic::PragmaticSolver;
pub use problem::{RoutingProblem, StopTiming};
pub use solver::{create_solver, verify_permutation, RouteSolver, SolverBackend, SolverError};

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::ItineraryError;
use crate::services::routing::DistanceTimeMatrices;
use crate::types::{Algorithm, Stop};

/// Stops in visiting order plus what produced that order
#[derive(Debug, Clone)]
pub struct SequencedRoute {
    pub stops: Vec<Stop>,
    pub algorithm_used: Algorithm,
    /// Set when `optimal` was requested but the heuristic ran
    pub fallback_reason: Option<SolverError>,
    /// Name of the optimal solver, when it produced the order
    pub solver_name: Option<String>,
}

/// Orders stops with nearest-neighbor or the configured optimal solver
#[derive(Clone)]
pub struct RouteSequencer {
    solver: Option<Arc<dyn RouteSolver>>,
}

impl RouteSequencer {
    pub fn new(solver: Option<Arc<dyn RouteSolver>>) -> Self {
        Self { solver }
    }

    /// Sequencer without an optimal backend; `optimal` always falls back
    pub fn heuristic_only() -> Self {
        Self { solver: None }
    }

    pub fn solver_name(&self) -> Option<&str> {
        self.solver.as_ref().map(|solver| solver.name())
    }

    /// Order `stops`, described in input order by `problem`.
    ///
    /// The result is always a permutation of the input.
    pub fn sequence(
        &self,
        stops: &[Stop],
        problem: &RoutingProblem,
        algorithm: Algorithm,
    ) -> Result<SequencedRoute, ItineraryError> {
        if stops.is_empty() {
            debug!("No stops to sequence");
            return Ok(SequencedRoute {
                stops: vec![],
                algorithm_used: algorithm,
                fallback_reason: None,
                solver_name: None,
            });
        }

        let mut fallback_reason = None;

        if algorithm == Algorithm::Optimal {
            let started_at = Instant::now();
            match self.solve_optimal(problem) {
                Ok(order) => {
                    let ordered = apply_order(stops, &order)?;
                    info!(
                        "Sequenced {} stops with {} in {} ms, {} late",
                        ordered.len(),
                        self.solver_name().unwrap_or("solver"),
                        started_at.elapsed().as_millis(),
                        problem.late_stops(&order),
                    );
                    return Ok(SequencedRoute {
                        stops: ordered,
                        algorithm_used: Algorithm::Optimal,
                        fallback_reason: None,
                        solver_name: self.solver_name().map(str::to_string),
                    });
                }
                Err(err) => {
                    warn!("Optimal solver failed, falling back to nearest-neighbor: {}", err);
                    fallback_reason = Some(err);
                }
            }
        }

        let mut route = sequence_nearest(stops, &problem.matrices)?;
        route.fallback_reason = fallback_reason;
        Ok(route)
    }

    fn solve_optimal(&self, problem: &RoutingProblem) -> Result<Vec<usize>, SolverError> {
        let solver = self.solver.as_ref().ok_or(SolverError::Unavailable)?;
        let order = solver.solve(problem)?;
        verify_permutation(&order, problem.stop_count()).map_err(SolverError::InvalidPermutation)?;
        Ok(order)
    }
}

impl Default for RouteSequencer {
    fn default() -> Self {
        Self::heuristic_only()
    }
}

/// Nearest-neighbor ordering after the optimal strategy was abandoned
/// outside the sequencer, e.g. on timeout.
pub fn fallback_sequence(
    stops: &[Stop],
    problem: &RoutingProblem,
    reason: SolverError,
) -> Result<SequencedRoute, ItineraryError> {
    warn!("Falling back to nearest-neighbor: {}", reason);
    let mut route = sequence_nearest(stops, &problem.matrices)?;
    route.fallback_reason = Some(reason);
    Ok(route)
}

fn sequence_nearest(stops: &[Stop], matrices: &DistanceTimeMatrices) -> Result<SequencedRoute, ItineraryError> {
    let order = nearest_neighbor(matrices);
    let ordered = apply_order(stops, &order)?;
    debug!("Sequenced {} stops with nearest-neighbor", ordered.len());

    Ok(SequencedRoute {
        stops: ordered,
        algorithm_used: Algorithm::Nearest,
        fallback_reason: None,
        solver_name: None,
    })
}

/// Nearest neighbor heuristic
/// Returns indices of stops in visit order (0 = start, 1..n = stops).
/// Ties go to the stop that comes first in input order.
pub fn nearest_neighbor(matrices: &DistanceTimeMatrices) -> Vec<usize> {
    let n = matrices.size;
    if n <= 1 {
        return vec![];
    }

    let mut visited = vec![false; n];
    let mut route = Vec::with_capacity(n - 1);

    visited[0] = true;
    let mut current = 0;

    for _ in 1..n {
        let mut best_next = None;
        let mut best_distance = f64::INFINITY;

        for j in 1..n {
            if visited[j] {
                continue;
            }
            let dist = matrices.distance(current, j);
            if best_next.is_none() || dist < best_distance {
                best_distance = dist;
                best_next = Some(j);
            }
        }

        if let Some(next) = best_next {
            visited[next] = true;
            route.push(next);
            current = next;
        }
    }

    route
}

/// Map matrix indices back to stops, checking the permutation postcondition
fn apply_order(stops: &[Stop], order: &[usize]) -> Result<Vec<Stop>, ItineraryError> {
    verify_permutation(order, stops.len()).map_err(ItineraryError::InvalidPermutation)?;
    Ok(order.iter().map(|&idx| stops[idx - 1].clone()).collect())
}
