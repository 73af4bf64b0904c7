//! Optimal solver configuration

use super::exact::MAX_EXACT_STOPS;

/// Configuration for the optimal solver backends
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Maximum solving time in seconds (vrp-pragmatic termination)
    pub max_time_seconds: u32,
    /// Maximum generations for metaheuristic
    pub max_generations: usize,
    /// Largest itinerary solved exactly by Held-Karp
    pub exact_stop_limit: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_time_seconds: 30,
            max_generations: 3000,
            exact_stop_limit: MAX_EXACT_STOPS,
        }
    }
}

impl SolverConfig {
    /// Create config with custom termination values
    pub fn new(max_time_seconds: u32, max_generations: usize) -> Self {
        Self {
            max_time_seconds,
            max_generations,
            ..Self::default()
        }
    }

    /// Fast configuration for interactive itinerary requests
    pub fn fast() -> Self {
        Self::new(5, 500)
    }

    /// Minimal solve time, used in tests
    #[cfg(test)]
    pub fn instant() -> Self {
        Self::new(2, 200)
    }

    /// Cap the exact solver; values above [`MAX_EXACT_STOPS`] are clamped
    pub fn with_exact_stop_limit(mut self, limit: usize) -> Self {
        self.exact_stop_limit = limit.min(MAX_EXACT_STOPS);
        self
    }
}
