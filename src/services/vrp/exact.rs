//! Held-Karp exact solver for small open routes.
//!
//! The route starts at matrix index 0 and ends at whichever stop is visited
//! last; there is no return leg. When windows are present the solver first
//! minimizes the number of late stops, then distance. State space is
//! `2^n * n` (times `n + 1` lateness levels with windows), so the solver
//! refuses itineraries above its stop limit.

use super::{RouteSolver, RoutingProblem, SolverError};

/// 2^12 * 12 * 13 labels stay within a few megabytes
pub const MAX_EXACT_STOPS: usize = 12;

/// Best partial path for one `(visited set, last stop, late count)` state
#[derive(Debug, Clone, Copy)]
struct Label {
    distance: f64,
    departure: f64,
    /// `(previous last stop, previous late count)`
    parent: Option<(usize, usize)>,
}

impl Label {
    fn beats(&self, other: &Option<Label>) -> bool {
        match other {
            None => true,
            Some(other) => {
                self.distance < other.distance
                    || (self.distance == other.distance && self.departure < other.departure)
            }
        }
    }
}

pub struct HeldKarpSolver {
    max_stops: usize,
}

impl HeldKarpSolver {
    pub fn new(max_stops: usize) -> Self {
        Self {
            max_stops: max_stops.min(MAX_EXACT_STOPS),
        }
    }

    pub fn max_stops(&self) -> usize {
        self.max_stops
    }
}

impl Default for HeldKarpSolver {
    fn default() -> Self {
        Self::new(MAX_EXACT_STOPS)
    }
}

impl RouteSolver for HeldKarpSolver {
    /// With `wait_for_window_start` the label kept per state is the shortest
    /// one, which is not always the earliest; lateness is then near-optimal.
    fn solve(&self, problem: &RoutingProblem) -> Result<Vec<usize>, SolverError> {
        let n = problem.stop_count();
        if n == 0 {
            return Ok(vec![]);
        }
        if n > self.max_stops {
            return Err(SolverError::ProblemTooLarge {
                stops: n,
                limit: self.max_stops,
            });
        }

        let matrices = &problem.matrices;
        let levels = if problem.has_time_windows() { n + 1 } else { 1 };
        let full = 1usize << n;
        let slot = |mask: usize, last: usize, late: usize| (mask * n + last) * levels + late;
        let mut labels: Vec<Option<Label>> = vec![None; full * n * levels];

        for first in 0..n {
            let visit = problem.visit(0.0, 0, first + 1);
            let late = usize::from(visit.late);
            if late >= levels {
                continue;
            }
            labels[slot(1 << first, first, late)] = Some(Label {
                distance: matrices.distance(0, first + 1),
                departure: visit.departure,
                parent: None,
            });
        }

        for mask in 1..full {
            for last in 0..n {
                if mask & (1 << last) == 0 {
                    continue;
                }
                for late in 0..levels {
                    let Some(label) = labels[slot(mask, last, late)] else {
                        continue;
                    };
                    for next in 0..n {
                        if mask & (1 << next) != 0 {
                            continue;
                        }
                        let visit = problem.visit(label.departure, last + 1, next + 1);
                        let next_late = late + usize::from(visit.late);
                        if next_late >= levels {
                            continue;
                        }
                        let candidate = Label {
                            distance: label.distance + matrices.distance(last + 1, next + 1),
                            departure: visit.departure,
                            parent: Some((last, late)),
                        };
                        let target = slot(mask | (1 << next), next, next_late);
                        if candidate.beats(&labels[target]) {
                            labels[target] = Some(candidate);
                        }
                    }
                }
            }
        }

        let all = full - 1;
        let mut best: Option<(usize, usize, f64)> = None;
        for late in 0..levels {
            for last in 0..n {
                if let Some(label) = labels[slot(all, last, late)] {
                    if best.map_or(true, |(_, _, distance)| label.distance < distance) {
                        best = Some((last, late, label.distance));
                    }
                }
            }
            if best.is_some() {
                break;
            }
        }

        let (mut node, mut late, distance) =
            best.ok_or_else(|| SolverError::Failed("no complete route found".to_string()))?;
        if !distance.is_finite() {
            return Err(SolverError::Failed("no finite route found".to_string()));
        }

        let mut order = Vec::with_capacity(n);
        let mut mask = all;
        loop {
            order.push(node + 1);
            let parent = labels[slot(mask, node, late)].and_then(|label| label.parent);
            mask &= !(1 << node);
            match parent {
                Some((prev, prev_late)) => {
                    node = prev;
                    late = prev_late;
                }
                None => break,
            }
        }
        order.reverse();

        Ok(order)
    }

    fn name(&self) -> &str {
        "held-karp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    use crate::services::routing::DistanceTimeMatrices;
    use crate::services::sequential_schedule::PropagationOptions;
    use crate::services::vrp::nearest_neighbor;
    use crate::services::vrp::verify_permutation;
    use crate::types::{Coordinates, Stop};

    fn path_length(matrices: &DistanceTimeMatrices, order: &[usize]) -> f64 {
        let mut prev = 0;
        let mut total = 0.0;
        for &idx in order {
            total += matrices.distance(prev, idx);
            prev = idx;
        }
        total
    }

    fn matrices_from(distances: Vec<Vec<f64>>) -> DistanceTimeMatrices {
        let size = distances.len();
        DistanceTimeMatrices {
            durations: distances.clone(),
            distances,
            size,
        }
    }

    fn solve(solver: &HeldKarpSolver, matrices: &DistanceTimeMatrices) -> Result<Vec<usize>, SolverError> {
        solver.solve(&RoutingProblem::from_matrices(matrices.clone()))
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_empty_problem() {
        let matrices = matrices_from(vec![vec![0.0]]);
        assert_eq!(solve(&HeldKarpSolver::default(), &matrices).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_single_stop() {
        let matrices = matrices_from(vec![vec![0.0, 5.0], vec![5.0, 0.0]]);
        assert_eq!(solve(&HeldKarpSolver::default(), &matrices).unwrap(), vec![1]);
    }

    #[test]
    fn test_beats_nearest_neighbor_trap() {
        // Start at 0 on a line: stop1 at +1, stop2 at -2, stop3 at +10.
        // Greedy goes 1 -> 2 -> 3 (1 + 3 + 12 = 16); optimal goes 2 -> 1 -> 3 (2 + 3 + 9 = 14).
        let positions = [0.0_f64, 1.0, -2.0, 10.0];
        let distances = positions
            .iter()
            .map(|a| positions.iter().map(|b| (a - b).abs()).collect())
            .collect();
        let matrices = matrices_from(distances);

        let greedy = nearest_neighbor(&matrices);
        assert_eq!(greedy, vec![1, 2, 3]);

        let exact = solve(&HeldKarpSolver::default(), &matrices).unwrap();
        assert_eq!(exact, vec![2, 1, 3]);
        assert!(path_length(&matrices, &exact) < path_length(&matrices, &greedy));
    }

    #[test]
    fn test_result_is_permutation_and_not_worse_than_greedy() {
        let locations: Vec<_> = [
            (50.08, 14.42),
            (50.10, 14.50),
            (50.02, 14.30),
            (50.15, 14.45),
            (50.05, 14.60),
            (49.99, 14.41),
            (50.12, 14.35),
        ]
        .iter()
        .map(|&(lat, lng)| Coordinates { lat, lng })
        .collect();
        let matrices = DistanceTimeMatrices::from_locations(&locations, 40.0).unwrap();

        let exact = solve(&HeldKarpSolver::default(), &matrices).unwrap();
        assert!(verify_permutation(&exact, 6).is_ok());

        let greedy = nearest_neighbor(&matrices);
        assert!(path_length(&matrices, &exact) <= path_length(&matrices, &greedy) + 1e-9);
    }

    #[test]
    fn test_rejects_large_problem() {
        let size = 5;
        let matrices = matrices_from(vec![vec![1.0; size]; size]);
        let solver = HeldKarpSolver::new(3);

        let result = solve(&solver, &matrices);
        assert_eq!(result, Err(SolverError::ProblemTooLarge { stops: 4, limit: 3 }));
    }

    #[test]
    fn test_deterministic() {
        let matrices = matrices_from(vec![vec![1.0; 6]; 6]);
        let solver = HeldKarpSolver::default();
        assert_eq!(solve(&solver, &matrices).unwrap(), solve(&solver, &matrices).unwrap());
    }

    #[test]
    fn test_prefers_on_time_route_over_shorter_one() {
        // "near" first is shorter overall but reaches "far" after its window closes
        let mut near = Stop::new("near", Some(Coordinates { lat: 50.0, lng: 14.1 }));
        near.service_duration_minutes = 30;
        let mut far = Stop::new("far", Some(Coordinates { lat: 50.0, lng: 14.3 }));
        far.service_duration_minutes = 10;
        far.window_end = Some(at(8, 40));
        let depot = Coordinates { lat: 50.0, lng: 14.0 };

        let problem = RoutingProblem::build(&[near, far], &depot, at(8, 0), 40.0, PropagationOptions::default()).unwrap();
        let greedy = nearest_neighbor(&problem.matrices);
        assert_eq!(greedy, vec![1, 2]);
        assert_eq!(problem.late_stops(&greedy), 1);

        let order = HeldKarpSolver::default().solve(&problem).unwrap();
        assert_eq!(order, vec![2, 1]);
        assert_eq!(problem.late_stops(&order), 0);
    }

    #[test]
    fn test_unavoidable_lateness_still_returns_route() {
        let mut late = Stop::new("late", Some(Coordinates { lat: 50.0, lng: 14.5 }));
        late.window_end = Some(at(8, 5));
        let other = Stop::new("other", Some(Coordinates { lat: 50.0, lng: 14.2 }));
        let depot = Coordinates { lat: 50.0, lng: 14.0 };

        let problem = RoutingProblem::build(&[late, other], &depot, at(8, 0), 40.0, PropagationOptions::default()).unwrap();
        let order = HeldKarpSolver::default().solve(&problem).unwrap();

        assert!(verify_permutation(&order, 2).is_ok());
        assert_eq!(problem.late_stops(&order), 1);
        // Lateness is fixed, so distance decides: west to east
        assert_eq!(order, vec![2, 1]);
    }
}
