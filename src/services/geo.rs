//! Geographic calculations

use crate::error::ItineraryError;
use crate::types::Coordinates;

/// Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// One travel leg between two points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelLeg {
    pub distance_km: f64,
    pub duration_minutes: f64,
}

/// Calculate Haversine distance between two points in kilometers
pub fn haversine_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    // Clamp guards against a > 1.0 from rounding on antipodal points
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Reject speeds that would make durations meaningless
pub fn validate_speed(speed_kmh: f64) -> Result<(), ItineraryError> {
    if speed_kmh.is_finite() && speed_kmh > 0.0 {
        Ok(())
    } else {
        Err(ItineraryError::InvalidSpeed(speed_kmh))
    }
}

/// Straight-line travel at constant speed
fn leg_between(from: &Coordinates, to: &Coordinates, speed_kmh: f64) -> TravelLeg {
    let distance_km = haversine_distance(from, to);
    TravelLeg {
        distance_km,
        duration_minutes: distance_km / speed_kmh * 60.0,
    }
}

/// Travel distance and duration between two optional points.
///
/// Speed is validated first; a missing point is never treated as zero distance.
pub fn travel_time(
    from: Option<&Coordinates>,
    to: Option<&Coordinates>,
    speed_kmh: f64,
) -> Result<TravelLeg, ItineraryError> {
    validate_speed(speed_kmh)?;
    let from = from.ok_or_else(|| missing_point("origin"))?;
    let to = to.ok_or_else(|| missing_point("destination"))?;
    Ok(leg_between(from, to, speed_kmh))
}

fn missing_point(subject: &str) -> ItineraryError {
    ItineraryError::MissingCoordinate { subject: subject.to_string() }
}
