//! Distance/time matrices for route sequencing
//!
//! Travel is modelled as straight-line distance at a constant speed; there is
//! no road network behind these numbers.

use crate::error::ItineraryError;
use crate::services::geo::{travel_time, validate_speed};
use crate::types::Coordinates;

/// Distance and time matrices between locations
///
/// Index 0 is the start point, index `i >= 1` is stop `i - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceTimeMatrices {
    /// Distance in kilometers [i][j] from location i to location j
    pub distances: Vec<Vec<f64>>,
    /// Duration in minutes [i][j] from location i to location j
    pub durations: Vec<Vec<f64>>,
    /// Number of locations
    pub size: usize,
}

impl DistanceTimeMatrices {
    /// Create empty matrices
    pub fn empty() -> Self {
        Self {
            distances: vec![],
            durations: vec![],
            size: 0,
        }
    }

    /// Pairwise straight-line matrices over `locations`
    pub fn from_locations(locations: &[Coordinates], speed_kmh: f64) -> Result<Self, ItineraryError> {
        validate_speed(speed_kmh)?;

        let n = locations.len();
        if n == 0 {
            return Ok(Self::empty());
        }

        let mut distances = vec![vec![0.0; n]; n];
        let mut durations = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in (i + 1)..n {
                let leg = travel_time(Some(&locations[i]), Some(&locations[j]), speed_kmh)?;
                distances[i][j] = leg.distance_km;
                distances[j][i] = leg.distance_km;
                durations[i][j] = leg.duration_minutes;
                durations[j][i] = leg.duration_minutes;
            }
        }

        Ok(Self {
            distances,
            durations,
            size: n,
        })
    }

    /// Get distance from location i to location j in kilometers
    pub fn distance(&self, from: usize, to: usize) -> f64 {
        self.distances[from][to]
    }

    /// Get duration from location i to location j in minutes
    pub fn duration(&self, from: usize, to: usize) -> f64 {
        self.durations[from][to]
    }

    /// Number of stops (locations excluding the start point)
    pub fn stop_count(&self) -> usize {
        self.size.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prague() -> Coordinates {
        Coordinates { lat: 50.0755, lng: 14.4378 }
    }

    fn brno() -> Coordinates {
        Coordinates { lat: 49.1951, lng: 16.6068 }
    }

    fn ostrava() -> Coordinates {
        Coordinates { lat: 49.8209, lng: 18.2625 }
    }

    #[test]
    fn test_matrices_empty_locations() {
        let matrices = DistanceTimeMatrices::from_locations(&[], 40.0).unwrap();
        assert_eq!(matrices.size, 0);
        assert_eq!(matrices.stop_count(), 0);
        assert!(matrices.distances.is_empty());
    }

    #[test]
    fn test_matrices_single_location() {
        let matrices = DistanceTimeMatrices::from_locations(&[prague()], 40.0).unwrap();
        assert_eq!(matrices.size, 1);
        assert_eq!(matrices.stop_count(), 0);
        assert_eq!(matrices.distance(0, 0), 0.0);
        assert_eq!(matrices.duration(0, 0), 0.0);
    }

    #[test]
    fn test_matrices_three_locations() {
        let matrices =
            DistanceTimeMatrices::from_locations(&[prague(), brno(), ostrava()], 40.0).unwrap();

        assert_eq!(matrices.size, 3);
        assert_eq!(matrices.stop_count(), 2);

        for i in 0..3 {
            assert_eq!(matrices.distance(i, i), 0.0);
            for j in 0..3 {
                assert_eq!(matrices.distance(i, j), matrices.distance(j, i));
                assert_eq!(matrices.duration(i, j), matrices.duration(j, i));
                if i != j {
                    assert!(matrices.distance(i, j) > 0.0);
                }
            }
        }

        // ~185 km at 40 km/h is roughly 4.6 hours
        let hours = matrices.duration(0, 1) / 60.0;
        assert!(hours > 4.0 && hours < 5.2, "got {} hours", hours);
    }

    #[test]
    fn test_matrices_reject_invalid_speed() {
        let result = DistanceTimeMatrices::from_locations(&[prague(), brno()], -1.0);
        assert_eq!(result, Err(ItineraryError::InvalidSpeed(-1.0)));
    }
}
