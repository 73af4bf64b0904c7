//! Itinerary computation pipeline
//!
//! validate -> filter -> sequence -> propagate both orders -> compare.
//! The engine holds no per-request state and can be shared across tasks.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::defaults::DEFAULT_SOLVER_TIMEOUT;
use crate::error::ItineraryError;
use crate::services::comparison::compare;
use crate::services::geo::validate_speed;
use crate::services::sequential_schedule::{propagate, PropagationOptions};
use crate::services::vrp::{
    fallback_sequence, RouteSequencer, RouteSolver, RoutingProblem, SequencedRoute, SolverError,
};
use crate::types::{Algorithm, ComparisonSummary, Coordinates, Sequence, Stop};

/// One technician's itinerary as handed to the engine
#[derive(Debug, Clone)]
pub struct ItineraryInput {
    /// Current order, typically as assigned
    pub stops: Vec<Stop>,
    pub start: Option<Coordinates>,
    pub start_time: DateTime<Utc>,
    pub speed_kmh: f64,
    pub algorithm: Algorithm,
    pub options: PropagationOptions,
    /// Drop stops without coordinates instead of failing
    pub exclude_unlocated: bool,
}

/// Both sequences with their comparison
#[derive(Debug, Clone)]
pub struct Itinerary {
    pub current: Sequence,
    pub optimized: Sequence,
    pub comparison: ComparisonSummary,
    pub algorithm_requested: Algorithm,
    pub algorithm_used: Algorithm,
    pub fallback_reason: Option<SolverError>,
    pub solver_name: Option<String>,
    pub excluded_job_ids: Vec<String>,
}

impl Itinerary {
    /// Human readable disclosure of an algorithm substitution
    pub fn note(&self) -> Option<String> {
        self.fallback_reason.as_ref().map(|reason| {
            format!(
                "{} requested but {} was used: {}",
                self.algorithm_requested, self.algorithm_used, reason
            )
        })
    }
}

pub struct ItineraryEngine {
    sequencer: RouteSequencer,
    solver_timeout: Duration,
}

impl ItineraryEngine {
    pub fn new(solver: Option<Arc<dyn RouteSolver>>, solver_timeout: Duration) -> Self {
        Self {
            sequencer: RouteSequencer::new(solver),
            solver_timeout,
        }
    }

    /// Engine whose optimal requests always fall back to nearest-neighbor
    pub fn heuristic_only() -> Self {
        Self::new(None, DEFAULT_SOLVER_TIMEOUT)
    }

    pub fn solver_name(&self) -> Option<&str> {
        self.sequencer.solver_name()
    }

    pub async fn compute(&self, input: ItineraryInput) -> Result<Itinerary, ItineraryError> {
        validate_speed(input.speed_kmh)?;
        check_unique_ids(&input.stops)?;

        let (located, excluded_job_ids) = split_located(input.stops, input.exclude_unlocated)?;
        if !excluded_job_ids.is_empty() {
            warn!("Excluding {} stops without coordinates", excluded_job_ids.len());
        }

        let start = match (input.start, located.is_empty()) {
            (Some(start), _) => start,
            (None, true) => {
                debug!("Empty itinerary, nothing to sequence");
                return Ok(empty_itinerary(input.start_time, input.algorithm, excluded_job_ids));
            }
            (None, false) => return Err(ItineraryError::missing_start()),
        };

        let current = propagate(&located, Some(&start), input.start_time, input.speed_kmh, input.options)?;

        let problem = RoutingProblem::build(&located, &start, input.start_time, input.speed_kmh, input.options)?;
        let route = match input.algorithm {
            Algorithm::Nearest => self.sequencer.sequence(&located, &problem, Algorithm::Nearest)?,
            Algorithm::Optimal => self.sequence_optimal(&located, problem).await?,
        };

        let optimized = propagate(&route.stops, Some(&start), input.start_time, input.speed_kmh, input.options)?;
        let comparison = compare(&current, &optimized);

        info!(
            "Itinerary computed: {} stops, {} used, delta {:.2} km",
            located.len(),
            route.algorithm_used,
            comparison.delta.distance_km,
        );

        Ok(Itinerary {
            current,
            optimized,
            comparison,
            algorithm_requested: input.algorithm,
            algorithm_used: route.algorithm_used,
            fallback_reason: route.fallback_reason,
            solver_name: route.solver_name,
            excluded_job_ids,
        })
    }

    /// Run the optimal solver off the async runtime under a deadline.
    /// A timed-out solve is abandoned and its result discarded.
    async fn sequence_optimal(
        &self,
        stops: &[Stop],
        problem: RoutingProblem,
    ) -> Result<SequencedRoute, ItineraryError> {
        let sequencer = self.sequencer.clone();
        let owned = stops.to_vec();
        let shared = Arc::new(problem);
        let task_problem = Arc::clone(&shared);
        let task = tokio::task::spawn_blocking(move || {
            sequencer.sequence(&owned, &task_problem, Algorithm::Optimal)
        });

        let reason = match tokio::time::timeout(self.solver_timeout, task).await {
            Ok(Ok(result)) => return result,
            Ok(Err(join_error)) => SolverError::Failed(format!("solver task aborted: {}", join_error)),
            Err(_) => SolverError::Timeout(self.solver_timeout),
        };

        fallback_sequence(stops, &shared, reason)
    }
}

impl Default for ItineraryEngine {
    fn default() -> Self {
        Self::heuristic_only()
    }
}

fn check_unique_ids(stops: &[Stop]) -> Result<(), ItineraryError> {
    let mut seen = HashSet::with_capacity(stops.len());
    for stop in stops {
        if !seen.insert(stop.job_id.as_str()) {
            return Err(ItineraryError::DuplicateStopId(stop.job_id.clone()));
        }
    }
    Ok(())
}

/// Separate located stops from unlocated ones, keeping input order
fn split_located(stops: Vec<Stop>, exclude_unlocated: bool) -> Result<(Vec<Stop>, Vec<String>), ItineraryError> {
    let mut located = Vec::with_capacity(stops.len());
    let mut excluded = Vec::new();

    for stop in stops {
        if stop.is_located() {
            located.push(stop);
        } else if exclude_unlocated {
            excluded.push(stop.job_id);
        } else {
            return Err(ItineraryError::missing_job(&stop.job_id));
        }
    }

    Ok((located, excluded))
}

fn empty_itinerary(start_time: DateTime<Utc>, algorithm: Algorithm, excluded_job_ids: Vec<String>) -> Itinerary {
    let current = Sequence::empty(None, start_time);
    let optimized = current.clone();
    let comparison = compare(&current, &optimized);

    Itinerary {
        current,
        optimized,
        comparison,
        algorithm_requested: algorithm,
        algorithm_used: algorithm,
        fallback_reason: None,
        solver_name: None,
        excluded_job_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::services::vrp::{create_solver, verify_permutation, HeldKarpSolver, SolverBackend, SolverConfig};

    struct FailingSolver;

    impl RouteSolver for FailingSolver {
        fn solve(&self, _problem: &RoutingProblem) -> Result<Vec<usize>, SolverError> {
            Err(SolverError::Unavailable)
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct SlowSolver;

    impl RouteSolver for SlowSolver {
        fn solve(&self, problem: &RoutingProblem) -> Result<Vec<usize>, SolverError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok((1..=problem.stop_count()).collect())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn input(stops: Vec<Stop>, algorithm: Algorithm) -> ItineraryInput {
        ItineraryInput {
            stops,
            start: Some(Coordinates { lat: 50.0, lng: 14.0 }),
            start_time: Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap(),
            speed_kmh: 40.0,
            algorithm,
            options: PropagationOptions::default(),
            exclude_unlocated: false,
        }
    }

    fn stops() -> Vec<Stop> {
        [("far", 14.3), ("near", 14.1), ("mid", 14.2), ("west", 13.95)]
            .iter()
            .map(|&(id, lng)| Stop::new(id, Some(Coordinates { lat: 50.0, lng })))
            .collect()
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    fn located(id: &str, lng: f64, service: u32) -> Stop {
        let mut stop = Stop::new(id, Some(Coordinates { lat: 50.0, lng }));
        stop.service_duration_minutes = service;
        stop
    }

    fn windowed(mut stop: Stop, start: DateTime<Utc>, end: DateTime<Utc>) -> Stop {
        stop.window_start = Some(start);
        stop.window_end = Some(end);
        stop
    }

    fn assert_same_jobs(itinerary: &Itinerary) {
        let mut current = itinerary.current.job_ids();
        let mut optimized = itinerary.optimized.job_ids();
        current.sort();
        optimized.sort();
        assert_eq!(current, optimized);
    }

    #[tokio::test]
    async fn test_current_keeps_input_order() {
        let itinerary = ItineraryEngine::heuristic_only()
            .compute(input(stops(), Algorithm::Nearest))
            .await
            .unwrap();

        assert_eq!(itinerary.current.job_ids(), vec!["far", "near", "mid", "west"]);
        assert_eq!(itinerary.optimized.job_ids(), vec!["west", "near", "mid", "far"]);
        assert_eq!(itinerary.algorithm_used, Algorithm::Nearest);
        assert!(itinerary.comparison.delta.distance_km < 0.0);
        assert!(itinerary.note().is_none());
    }

    #[tokio::test]
    async fn test_optimal_falls_back_when_solver_fails() {
        let engine = ItineraryEngine::new(Some(Arc::new(FailingSolver)), Duration::from_secs(5));
        let itinerary = engine.compute(input(stops(), Algorithm::Optimal)).await.unwrap();

        assert_eq!(itinerary.algorithm_requested, Algorithm::Optimal);
        assert_eq!(itinerary.algorithm_used, Algorithm::Nearest);
        assert_eq!(itinerary.fallback_reason, Some(SolverError::Unavailable));
        assert!(itinerary.note().unwrap().contains("nearest was used"));
        assert_same_jobs(&itinerary);
    }

    #[tokio::test]
    async fn test_optimal_falls_back_on_timeout() {
        let engine = ItineraryEngine::new(Some(Arc::new(SlowSolver)), Duration::from_millis(20));
        let itinerary = engine.compute(input(stops(), Algorithm::Optimal)).await.unwrap();

        assert_eq!(itinerary.algorithm_used, Algorithm::Nearest);
        assert_eq!(
            itinerary.fallback_reason,
            Some(SolverError::Timeout(Duration::from_millis(20)))
        );
        assert_eq!(itinerary.optimized.job_ids(), vec!["west", "near", "mid", "far"]);
    }

    #[tokio::test]
    async fn test_optimal_with_exact_solver() {
        let engine = ItineraryEngine::new(Some(Arc::new(HeldKarpSolver::default())), Duration::from_secs(5));
        let itinerary = engine.compute(input(stops(), Algorithm::Optimal)).await.unwrap();

        assert_eq!(itinerary.algorithm_used, Algorithm::Optimal);
        assert_eq!(itinerary.solver_name.as_deref(), Some("held-karp"));
        assert!(itinerary.fallback_reason.is_none());
        assert!(itinerary.comparison.optimized.total_travel_distance_km
            <= itinerary.comparison.current.total_travel_distance_km + 1e-9);
        assert_same_jobs(&itinerary);
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected() {
        let mut stops = stops();
        stops.push(Stop::new("near", Some(Coordinates { lat: 50.1, lng: 14.1 })));

        let result = ItineraryEngine::heuristic_only()
            .compute(input(stops, Algorithm::Nearest))
            .await;

        assert_eq!(result.unwrap_err(), ItineraryError::DuplicateStopId("near".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_speed_rejected() {
        let mut request = input(stops(), Algorithm::Nearest);
        request.speed_kmh = -1.0;

        let result = ItineraryEngine::heuristic_only().compute(request).await;
        assert_eq!(result.unwrap_err(), ItineraryError::InvalidSpeed(-1.0));
    }

    #[tokio::test]
    async fn test_unlocated_stop_rejected_by_default() {
        let mut stops = stops();
        stops.push(Stop::new("nowhere", None));

        let result = ItineraryEngine::heuristic_only()
            .compute(input(stops, Algorithm::Nearest))
            .await;

        assert_eq!(result.unwrap_err(), ItineraryError::missing_job("nowhere"));
    }

    #[tokio::test]
    async fn test_unlocated_stop_excluded_on_request() {
        let mut stops = stops();
        stops.insert(1, Stop::new("nowhere", None));
        let mut request = input(stops, Algorithm::Nearest);
        request.exclude_unlocated = true;

        let itinerary = ItineraryEngine::heuristic_only().compute(request).await.unwrap();

        assert_eq!(itinerary.excluded_job_ids, vec!["nowhere".to_string()]);
        assert_eq!(itinerary.current.stops.len(), 4);
        assert!(!itinerary.optimized.job_ids().contains(&"nowhere"));
    }

    #[tokio::test]
    async fn test_missing_start_rejected() {
        let mut request = input(stops(), Algorithm::Nearest);
        request.start = None;

        let result = ItineraryEngine::heuristic_only().compute(request).await;
        assert_eq!(result.unwrap_err(), ItineraryError::missing_start());
    }

    #[tokio::test]
    async fn test_empty_itinerary() {
        let mut request = input(vec![], Algorithm::Optimal);
        request.start = None;

        let itinerary = ItineraryEngine::heuristic_only().compute(request).await.unwrap();

        assert!(itinerary.current.stops.is_empty());
        assert!(itinerary.optimized.stops.is_empty());
        assert_eq!(itinerary.comparison.current.total_travel_distance_km, 0.0);
        assert!(itinerary.comparison.optimized_matches_current);
        assert!(itinerary.fallback_reason.is_none());
    }

    #[tokio::test]
    async fn test_optimized_is_permutation() {
        let itinerary = ItineraryEngine::heuristic_only()
            .compute(input(stops(), Algorithm::Nearest))
            .await
            .unwrap();

        let positions: Vec<usize> = itinerary
            .optimized
            .job_ids()
            .iter()
            .map(|id| itinerary.current.job_ids().iter().position(|c| c == id).unwrap() + 1)
            .collect();
        assert!(verify_permutation(&positions, 4).is_ok());
    }

    #[tokio::test]
    async fn test_three_stop_day_picks_nearest_and_flags_it() {
        // B is the closest stop to the depot, ~43 km out: reached ~09:54, after its 09:45 close
        let a = windowed(located("A", 14.7, 15), at(9, 0), at(10, 0));
        let b = windowed(located("B", 14.6, 10), at(9, 30), at(9, 45));
        let c = located("C", 14.8, 20);

        let mut request = input(vec![a, b, c], Algorithm::Nearest);
        request.start_time = at(8, 50);

        let itinerary = ItineraryEngine::heuristic_only().compute(request).await.unwrap();

        assert_eq!(itinerary.current.job_ids(), vec!["A", "B", "C"]);
        assert_eq!(itinerary.optimized.job_ids(), vec!["B", "A", "C"]);

        let first = &itinerary.optimized.stops[0];
        assert!(first.arrival_time > at(9, 45));
        assert!(first.arrival_time < at(10, 0));

        let late: Vec<&str> = itinerary.optimized.violations.iter().map(|v| v.job_id.as_str()).collect();
        assert!(late.contains(&"B"));
        assert!(!late.contains(&"C"));
    }

    #[tokio::test]
    async fn test_optimal_avoids_late_arrival_nearest_incurs() {
        // Greedy visits "near" first and misses the 08:40 close at "far"
        let near = located("near", 14.1, 30);
        let far = windowed(located("far", 14.3, 10), at(8, 0), at(8, 40));
        let stops = vec![near, far];

        let nearest = ItineraryEngine::heuristic_only()
            .compute(input(stops.clone(), Algorithm::Nearest))
            .await
            .unwrap();
        assert_eq!(nearest.optimized.job_ids(), vec!["near", "far"]);
        assert_eq!(nearest.optimized.violations.len(), 1);

        for backend in [SolverBackend::Exact, SolverBackend::Auto, SolverBackend::Pragmatic] {
            let engine = ItineraryEngine::new(create_solver(backend, &SolverConfig::instant()), Duration::from_secs(10));
            let optimal = engine.compute(input(stops.clone(), Algorithm::Optimal)).await.unwrap();

            assert_eq!(optimal.algorithm_used, Algorithm::Optimal, "{:?}", backend);
            assert_eq!(optimal.optimized.job_ids(), vec!["far", "near"], "{:?}", backend);
            assert!(optimal.optimized.violations.is_empty(), "{:?}", backend);
        }
    }

    #[tokio::test]
    async fn test_every_backend_keeps_the_same_jobs() {
        let config = SolverConfig::instant();
        let day: Vec<Stop> = (0..8)
            .map(|i| {
                let stop = located(&format!("job-{}", i), 14.0 + ((i * 7) % 11) as f64 * 0.03 - 0.15, 20);
                if i % 3 == 0 {
                    windowed(stop, at(8, 0), at(9 + i as u32, 0))
                } else {
                    stop
                }
            })
            .collect();

        for backend in [SolverBackend::None, SolverBackend::Exact, SolverBackend::Auto, SolverBackend::Pragmatic] {
            let engine = ItineraryEngine::new(create_solver(backend, &config), Duration::from_secs(10));
            for count in [1, 3, 8] {
                let itinerary = engine
                    .compute(input(day[..count].to_vec(), Algorithm::Optimal))
                    .await
                    .unwrap();

                assert_eq!(itinerary.optimized.stops.len(), count, "{:?}", backend);
                assert_same_jobs(&itinerary);
            }
        }
    }

    #[tokio::test]
    async fn test_crawling_speed_is_an_error() {
        let mut request = input(vec![located("far", 15.0, 10)], Algorithm::Nearest);
        request.speed_kmh = 1e-9;

        let result = ItineraryEngine::heuristic_only().compute(request).await;
        assert_eq!(
            result.unwrap_err(),
            ItineraryError::ScheduleOutOfRange { job_id: "far".to_string() }
        );
    }
}
