//! Itinerary engine errors

use thiserror::Error;

/// Validation failures surfaced to the caller.
///
/// Solver problems are not part of this type: they never fail a request and
/// are reported through [`crate::services::vrp::SolverError`] as a fallback
/// reason instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ItineraryError {
    #[error("speed must be a positive number of km/h, got {0}")]
    InvalidSpeed(f64),

    /// `subject` names the point: "start location", "job <id>", ...
    #[error("missing coordinates for {subject}")]
    MissingCoordinate { subject: String },

    #[error("duplicate stop id: {0}")]
    DuplicateStopId(String),

    #[error("sequence is not a permutation of the input stops: {0}")]
    InvalidPermutation(String),

    /// Arrival or departure falls outside the representable calendar
    #[error("schedule for job {job_id} runs past the supported time range")]
    ScheduleOutOfRange { job_id: String },
}

impl ItineraryError {
    pub fn missing_start() -> Self {
        Self::MissingCoordinate { subject: "start location".to_string() }
    }

    pub fn missing_job(job_id: &str) -> Self {
        Self::MissingCoordinate { subject: format!("job {}", job_id) }
    }

    /// Wire error code used in NATS error responses
    pub const fn code(&self) -> &'static str {
        match self {
            ItineraryError::InvalidSpeed(_) => "INVALID_SPEED",
            ItineraryError::MissingCoordinate { .. } => "MISSING_COORDINATE",
            ItineraryError::DuplicateStopId(_) => "DUPLICATE_STOP_ID",
            ItineraryError::InvalidPermutation(_) => "INVALID_PERMUTATION",
            ItineraryError::ScheduleOutOfRange { .. } => "SCHEDULE_OUT_OF_RANGE",
        }
    }
}
