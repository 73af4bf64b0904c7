//! Adapter to build vrp-pragmatic inputs.
//!
//! The itinerary is modelled as a single vehicle leaving the start point with
//! no return leg. Jobs are named after their matrix index so the solution can
//! be mapped back without a lookup table. Service durations and windows are
//! carried as place `duration` and `times`; the shift starts at a fixed
//! epoch and every window is placed relative to it.

use chrono::{DateTime, SecondsFormat};
use serde_json::{json, Value};
use vrp_pragmatic::format::problem::Matrix;

use crate::services::routing::DistanceTimeMatrices;
use super::{RoutingProblem, StopTiming};

pub const DEFAULT_PROFILE: &str = "car";
pub const DEFAULT_VEHICLE_ID: &str = "technician";
pub const DEFAULT_VEHICLE_TYPE: &str = "technician";

/// Shift anchor; only relative times matter to the solver
const PLANNING_EPOCH: &str = "2000-01-01T00:00:00Z";
const PLANNING_EPOCH_SECS: i64 = 946_684_800;

const JOB_PREFIX: &str = "stop-";

pub fn job_id(matrix_index: usize) -> String {
    format!("{}{}", JOB_PREFIX, matrix_index)
}

/// Inverse of [`job_id`]
pub fn matrix_index(job_id: &str) -> Option<usize> {
    job_id.strip_prefix(JOB_PREFIX)?.parse().ok()
}

/// Build pragmatic problem JSON for an open route over the problem's stops
pub fn build_pragmatic_problem(problem: &RoutingProblem) -> Value {
    let jobs: Vec<Value> = problem
        .timings
        .iter()
        .enumerate()
        .map(|(offset, timing)| {
            let index = offset + 1;
            let place = json!({
                "location": { "index": index },
                "duration": (timing.service_minutes * 60.0).round() as i64,
            });

            let place = match time_window(problem, index, timing) {
                Some((start, end)) => add_time_window(place, start, end),
                None => place,
            };

            json!({
                "id": job_id(index),
                "services": [{
                    "places": [place]
                }]
            })
        })
        .collect();

    json!({
        "plan": {
            "jobs": jobs
        },
        "fleet": {
            "vehicles": [{
                "typeId": DEFAULT_VEHICLE_TYPE,
                "vehicleIds": [DEFAULT_VEHICLE_ID],
                "profile": { "matrix": DEFAULT_PROFILE },
                "costs": {
                    "fixed": 0.0,
                    "distance": 1.0,
                    "time": 1.0
                },
                "shifts": [{
                    "start": {
                        "earliest": PLANNING_EPOCH,
                        "location": { "index": 0 }
                    }
                }],
                "capacity": [1000]
            }],
            "profiles": [{
                "name": DEFAULT_PROFILE
            }]
        }
    })
}

/// Window in minutes after the shift start, as the solver should see it.
///
/// The lower bound only binds when the technician waits for windows to open.
/// A window that cannot be met even by driving there first is dropped: that
/// stop is late in every order and would otherwise be left unassigned.
fn time_window(problem: &RoutingProblem, index: usize, timing: &StopTiming) -> Option<(f64, f64)> {
    let end = timing.window_end?;
    if end < problem.matrices.duration(0, index) {
        return None;
    }

    let start = match timing.window_start {
        Some(start) if problem.wait_for_window_start => start.max(0.0),
        _ => 0.0,
    };

    (start <= end).then_some((start, end))
}

fn add_time_window(base: Value, start: f64, end: f64) -> Value {
    match (format_offset(start), format_offset(end)) {
        (Some(start), Some(end)) => json!({
            "location": base["location"].clone(),
            "duration": base["duration"].clone(),
            "times": [[start, end]]
        }),
        _ => base,
    }
}

/// RFC 3339 timestamp `minutes` after the planning epoch, whole seconds
fn format_offset(minutes: f64) -> Option<String> {
    let seconds = (minutes * 60.0).floor();
    if !seconds.is_finite() || seconds.abs() > i64::MAX as f64 / 2.0 {
        return None;
    }
    let at = DateTime::from_timestamp(PLANNING_EPOCH_SECS.checked_add(seconds as i64)?, 0)?;
    Some(at.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Build pragmatic routing matrix (meters, seconds) from km/minute matrices.
pub fn build_pragmatic_matrix(
    matrices: &DistanceTimeMatrices,
    profile: &str,
) -> Matrix {
    let size = matrices.size;
    let mut travel_times = Vec::with_capacity(size * size);
    let mut distances = Vec::with_capacity(size * size);

    for i in 0..size {
        for j in 0..size {
            travel_times.push((matrices.duration(i, j) * 60.0).round() as i64);
            distances.push((matrices.distance(i, j) * 1000.0).round() as i64);
        }
    }

    Matrix {
        profile: Some(profile.to_string()),
        timestamp: None,
        travel_times,
        distances,
        error_codes: None,
    }
}
