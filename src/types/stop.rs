//! Stop and coordinate types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::defaults::DEFAULT_SERVICE_DURATION_MINUTES;

/// Coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    #[serde(alias = "lon")]
    pub lng: f64,
}

/// One scheduled visit assigned to a technician
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    /// Opaque job identifier, unique within one itinerary
    #[serde(deserialize_with = "deserialize_job_id")]
    pub job_id: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub window_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub window_end: Option<DateTime<Utc>>,
    /// Estimated minutes on site
    #[serde(default = "default_service_duration")]
    pub service_duration_minutes: u32,
}

impl Stop {
    #[cfg(test)]
    pub fn new(job_id: impl Into<String>, coordinates: Option<Coordinates>) -> Self {
        Self {
            job_id: job_id.into(),
            customer_name: String::new(),
            coordinates,
            window_start: None,
            window_end: None,
            service_duration_minutes: DEFAULT_SERVICE_DURATION_MINUTES,
        }
    }

    pub fn is_located(&self) -> bool {
        self.coordinates.is_some()
    }
}

fn default_service_duration() -> u32 {
    DEFAULT_SERVICE_DURATION_MINUTES
}

/// Upstream job ids are integers, but the engine treats them as opaque strings.
pub fn deserialize_job_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Unsigned(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
        RawId::Unsigned(n) => n.to_string(),
    })
}
