//! Sequential arrival/departure propagation.
//!
//! Given stops in visiting order, walks the route from the start point and
//! computes arrival and departure times for each stop, flagging stops reached
//! after their window closes. This does NOT re-order anything.

use chrono::{DateTime, Duration, Utc};

use crate::error::ItineraryError;
use crate::services::geo::{travel_time, validate_speed};
use crate::types::{Coordinates, ScheduledStop, Sequence, Stop, Violation};

/// Knobs for [`propagate`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationOptions {
    /// Idle until `window_start` when arriving early. Off by default: the
    /// technician starts service on arrival.
    pub wait_for_window_start: bool,
}

/// Fractional minutes as a chrono duration, millisecond precision.
///
/// `None` when the value does not fit a chrono duration.
pub fn minutes(value: f64) -> Option<Duration> {
    let millis = (value * 60_000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64)
}

/// `at + offset` minutes, failing instead of overflowing
fn advance(at: DateTime<Utc>, offset: f64, job_id: &str) -> Result<DateTime<Utc>, ItineraryError> {
    minutes(offset)
        .and_then(|delta| at.checked_add_signed(delta))
        .ok_or_else(|| ItineraryError::ScheduleOutOfRange { job_id: job_id.to_string() })
}

/// Minutes between two instants, negative when `to` is earlier
pub fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

/// Compute the schedule for `stops` in the given order.
///
/// An empty stop list yields an empty sequence and does not require a start.
/// Every stop must carry coordinates; nothing is skipped. Times that leave
/// chrono's range (absurdly slow speeds, enormous service durations) are
/// rejected with [`ItineraryError::ScheduleOutOfRange`].
pub fn propagate(
    stops: &[Stop],
    start: Option<&Coordinates>,
    start_time: DateTime<Utc>,
    speed_kmh: f64,
    options: PropagationOptions,
) -> Result<Sequence, ItineraryError> {
    validate_speed(speed_kmh)?;

    if stops.is_empty() {
        return Ok(Sequence::empty(start.copied(), start_time));
    }

    let start = start.ok_or_else(ItineraryError::missing_start)?;

    let mut scheduled = Vec::with_capacity(stops.len());
    let mut violations = Vec::new();
    let mut position = *start;
    let mut cursor = start_time;

    for stop in stops {
        let coordinates = stop
            .coordinates
            .ok_or_else(|| ItineraryError::missing_job(&stop.job_id))?;

        let leg = travel_time(Some(&position), Some(&coordinates), speed_kmh)?;
        let arrival_time = advance(cursor, leg.duration_minutes, &stop.job_id)?;

        let waiting_minutes = match stop.window_start {
            Some(window_start) if options.wait_for_window_start && window_start > arrival_time => {
                minutes_between(arrival_time, window_start)
            }
            _ => 0.0,
        };

        let service_start = advance(arrival_time, waiting_minutes, &stop.job_id)?;
        let departure_time = advance(service_start, stop.service_duration_minutes as f64, &stop.job_id)?;

        if let Some(window_end) = stop.window_end {
            if arrival_time > window_end {
                violations.push(Violation {
                    job_id: stop.job_id.clone(),
                    arrival_time,
                    window_end,
                    late_minutes: minutes_between(window_end, arrival_time),
                });
            }
        }

        scheduled.push(ScheduledStop {
            job_id: stop.job_id.clone(),
            customer_name: stop.customer_name.clone(),
            coordinates,
            window_start: stop.window_start,
            window_end: stop.window_end,
            arrival_time,
            departure_time,
            distance_from_previous_km: leg.distance_km,
            travel_minutes_from_previous: leg.duration_minutes,
            waiting_minutes,
            service_minutes: stop.service_duration_minutes,
        });

        position = coordinates;
        cursor = departure_time;
    }

    Ok(Sequence {
        start: Some(*start),
        start_time,
        stops: scheduled,
        violations,
    })
}
