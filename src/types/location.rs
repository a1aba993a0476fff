//! Geographic coordinates used for nearest station and municipality resolution.

use serde::{Deserialize, Serialize};

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
///
/// # Examples
///
/// ```
/// use aemet::LatLon;
///
/// let madrid = LatLon(40.4168, -3.7038);
/// assert_eq!(madrid.0, 40.4168); // Latitude
/// assert_eq!(madrid.1, -3.7038); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    /// Both components are finite and inside the valid degree ranges.
    pub fn is_valid(&self) -> bool {
        self.0.is_finite()
            && self.1.is_finite()
            && (-90.0..=90.0).contains(&self.0)
            && (-180.0..=180.0).contains(&self.1)
    }
}

/// The location weather is requested for.
///
/// Elevation is carried along for display purposes but never takes part in
/// distance computations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in decimal degrees (positive for North).
    pub latitude: f64,
    /// Longitude in decimal degrees (negative for West).
    pub longitude: f64,
    /// Elevation above sea level in meters.
    pub elevation: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation,
        }
    }

    pub fn lat_lon(&self) -> LatLon {
        LatLon(self.latitude, self.longitude)
    }
}
