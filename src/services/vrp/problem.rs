//! Routing problem handed to the optimal solvers.
//!
//! Times are minutes relative to the itinerary start. Matrix index 0 is the
//! start point and `timings[i - 1]` belongs to matrix index `i`.

use chrono::{DateTime, Utc};

use crate::error::ItineraryError;
use crate::services::routing::DistanceTimeMatrices;
use crate::services::sequential_schedule::{minutes_between, PropagationOptions};
use crate::types::{Coordinates, Stop};

/// Service time and window of one stop
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StopTiming {
    pub service_minutes: f64,
    pub window_start: Option<f64>,
    pub window_end: Option<f64>,
}

/// One simulated visit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Visit {
    pub arrival: f64,
    pub departure: f64,
    /// Arrived strictly after the window closed
    pub late: bool,
}

#[derive(Debug, Clone)]
pub struct RoutingProblem {
    pub matrices: DistanceTimeMatrices,
    pub timings: Vec<StopTiming>,
    pub wait_for_window_start: bool,
}

impl RoutingProblem {
    /// Problem without windows or service time, only the matrices matter
    #[cfg(test)]
    pub fn from_matrices(matrices: DistanceTimeMatrices) -> Self {
        let timings = vec![StopTiming::default(); matrices.stop_count()];
        Self {
            matrices,
            timings,
            wait_for_window_start: false,
        }
    }

    /// Build the problem for `stops` in input order. Every stop must be located.
    pub fn build(
        stops: &[Stop],
        start: &Coordinates,
        start_time: DateTime<Utc>,
        speed_kmh: f64,
        options: PropagationOptions,
    ) -> Result<Self, ItineraryError> {
        let mut locations = Vec::with_capacity(stops.len() + 1);
        locations.push(*start);
        for stop in stops {
            let coordinates = stop
                .coordinates
                .ok_or_else(|| ItineraryError::missing_job(&stop.job_id))?;
            locations.push(coordinates);
        }

        let timings = stops
            .iter()
            .map(|stop| StopTiming {
                service_minutes: stop.service_duration_minutes as f64,
                window_start: stop.window_start.map(|at| minutes_between(start_time, at)),
                window_end: stop.window_end.map(|at| minutes_between(start_time, at)),
            })
            .collect();

        Ok(Self {
            matrices: DistanceTimeMatrices::from_locations(&locations, speed_kmh)?,
            timings,
            wait_for_window_start: options.wait_for_window_start,
        })
    }

    pub fn stop_count(&self) -> usize {
        self.matrices.stop_count()
    }

    /// Whether any window can influence the schedule
    pub fn has_time_windows(&self) -> bool {
        self.timings.iter().any(|timing| {
            timing.window_end.is_some() || (self.wait_for_window_start && timing.window_start.is_some())
        })
    }

    /// Travel from matrix index `from`, left at `departure`, to index `to`
    pub fn visit(&self, departure: f64, from: usize, to: usize) -> Visit {
        let timing = &self.timings[to - 1];
        let arrival = departure + self.matrices.duration(from, to);
        let service_start = match timing.window_start {
            Some(window_start) if self.wait_for_window_start && window_start > arrival => window_start,
            _ => arrival,
        };

        Visit {
            arrival,
            departure: service_start + timing.service_minutes,
            late: matches!(timing.window_end, Some(end) if arrival > end),
        }
    }

    /// Number of stops reached after their window closes along `order`
    pub fn late_stops(&self, order: &[usize]) -> usize {
        let mut late = 0;
        let mut position = 0;
        let mut clock = 0.0;
        for &next in order {
            let visit = self.visit(clock, position, next);
            late += usize::from(visit.late);
            position = next;
            clock = visit.departure;
        }
        late
    }
}
