//! Aggregate totals for a sequence and the optimized-vs-current delta

use crate::services::sequential_schedule::minutes_between;
use crate::types::{ComparisonSummary, Delta, Sequence, SequenceSummary};

/// Totals for one sequence.
///
/// Travel minutes count driving only; elapsed minutes run from the start time
/// to the last departure and so include service and waiting.
pub fn summarize(sequence: &Sequence) -> SequenceSummary {
    let total_travel_distance_km = sequence
        .stops
        .iter()
        .map(|stop| stop.distance_from_previous_km)
        .sum();
    let total_travel_minutes = sequence
        .stops
        .iter()
        .map(|stop| stop.travel_minutes_from_previous)
        .sum();
    let total_elapsed_minutes = sequence
        .stops
        .last()
        .map(|last| minutes_between(sequence.start_time, last.departure_time))
        .unwrap_or(0.0);

    SequenceSummary {
        total_travel_distance_km,
        total_travel_minutes,
        total_elapsed_minutes,
        stop_count: sequence.stops.len(),
        violation_count: sequence.violations.len(),
    }
}

/// Compare two sequences. `delta` is optimized minus current and is not clamped.
pub fn compare(current: &Sequence, optimized: &Sequence) -> ComparisonSummary {
    let current_summary = summarize(current);
    let optimized_summary = summarize(optimized);

    let delta = Delta {
        distance_km: optimized_summary.total_travel_distance_km - current_summary.total_travel_distance_km,
        travel_minutes: optimized_summary.total_travel_minutes - current_summary.total_travel_minutes,
        elapsed_minutes: optimized_summary.total_elapsed_minutes - current_summary.total_elapsed_minutes,
    };

    ComparisonSummary {
        current: current_summary,
        optimized: optimized_summary,
        delta,
        optimized_matches_current: current.job_ids() == optimized.job_ids(),
    }
}
