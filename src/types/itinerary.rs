//! Itinerary types: computed sequences, comparison metrics and the
//! request/response payloads of `dispatch.itinerary.compute`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{deserialize_job_id, Coordinates, Stop};

/// Route sequencing strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Greedy nearest-neighbor heuristic
    #[default]
    Nearest,
    /// Injected combinatorial solver
    Optimal,
}

impl Algorithm {
    pub const fn as_str(self) -> &'static str {
        match self {
            Algorithm::Nearest => "nearest",
            Algorithm::Optimal => "optimal",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stop with its computed timing inside one sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledStop {
    pub job_id: String,
    pub customer_name: String,
    pub coordinates: Coordinates,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub arrival_time: DateTime<Utc>,
    pub departure_time: DateTime<Utc>,
    pub distance_from_previous_km: f64,
    pub travel_minutes_from_previous: f64,
    /// Time spent waiting for the window to open (0 unless waiting is enabled)
    pub waiting_minutes: f64,
    pub service_minutes: u32,
}

/// Arrival after the promised end of a stop's window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub job_id: String,
    pub arrival_time: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub late_minutes: f64,
}

/// Ordered stops with propagated times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub start: Option<Coordinates>,
    pub start_time: DateTime<Utc>,
    pub stops: Vec<ScheduledStop>,
    pub violations: Vec<Violation>,
}

impl Sequence {
    pub fn empty(start: Option<Coordinates>, start_time: DateTime<Utc>) -> Self {
        Self {
            start,
            start_time,
            stops: vec![],
            violations: vec![],
        }
    }

    pub fn job_ids(&self) -> Vec<&str> {
        self.stops.iter().map(|s| s.job_id.as_str()).collect()
    }
}

/// Aggregates of one sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequenceSummary {
    pub total_travel_distance_km: f64,
    pub total_travel_minutes: f64,
    /// From start time to the last departure
    pub total_elapsed_minutes: f64,
    pub stop_count: usize,
    pub violation_count: usize,
}

/// `optimized - current`; negative means the optimized route is shorter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub distance_km: f64,
    /// Driving time only
    pub travel_minutes: f64,
    /// Start to last departure, so service and waiting count too
    pub elapsed_minutes: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub current: SequenceSummary,
    pub optimized: SequenceSummary,
    pub delta: Delta,
    /// Both sequences visit the jobs in the same order
    pub optimized_matches_current: bool,
}

// ============================================================================
// NATS payloads
// ============================================================================

/// Payload of `dispatch.itinerary.compute`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItineraryRequest {
    #[serde(deserialize_with = "deserialize_job_id")]
    pub technician_id: String,
    #[serde(default)]
    pub stops: Vec<Stop>,
    #[serde(default)]
    pub start: Option<Coordinates>,
    /// Departure time from the start point (defaults to now)
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub speed_kmh: Option<f64>,
    #[serde(default)]
    pub algorithm: Algorithm,
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub wait_for_window_start: bool,
    #[serde(default)]
    pub exclude_unlocated: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceView {
    pub stops: Vec<ScheduledStop>,
    pub total_travel_km: f64,
    pub total_travel_minutes: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViolationsView {
    pub current: Vec<Violation>,
    pub optimized: Vec<Violation>,
}

/// Reply payload of `dispatch.itinerary.compute`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItineraryResponse {
    pub technician_id: String,
    pub as_of_timestamp: DateTime<Utc>,
    pub algorithm_requested: Algorithm,
    pub algorithm_used: Algorithm,
    /// Discloses a solver fallback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver: Option<String>,
    pub current: SequenceView,
    pub optimized: SequenceView,
    pub comparison: ComparisonSummary,
    pub violations: ViolationsView,
    #[serde(default)]
    pub excluded_job_ids: Vec<String>,
    #[serde(default)]
    pub cached: bool,
}
