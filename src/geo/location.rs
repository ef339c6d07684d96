//! Validated geographic coordinates.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Latitude/longitude in degrees with optional human labels.
///
/// Immutable once constructed; use [`Location::new`] so the ranges are
/// checked at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    latitude: f64,
    longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    country: Option<String>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::InvalidLatitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::InvalidLongitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
            city: None,
            country: None,
        })
    }

    /// Attach display labels.
    pub fn with_labels(mut self, city: Option<String>, country: Option<String>) -> Self {
        self.city = city;
        self.country = country;
        self
    }

    /// Re-check the ranges, for values that came in through deserialization.
    pub fn validate(&self) -> Result<(), ValidationError> {
        Self::new(self.latitude, self.longitude).map(|_| ())
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    /// IANA timezone covering these coordinates, UTC when the lookup fails.
    pub fn timezone(&self) -> Tz {
        let finder = tzf_rs::DefaultFinder::new();
        finder
            .get_tz_name(self.longitude, self.latitude)
            .parse::<Tz>()
            .unwrap_or(Tz::UTC)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ns = if self.latitude >= 0.0 { 'N' } else { 'S' };
        let ew = if self.longitude >= 0.0 { 'E' } else { 'W' };
        write!(
            f,
            "{:.4}°{ns}, {:.4}°{ew}",
            self.latitude.abs(),
            self.longitude.abs()
        )?;
        match (&self.city, &self.country) {
            (Some(city), Some(country)) => write!(f, " ({city}, {country})"),
            (Some(city), None) => write!(f, " ({city})"),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(
            Location::new(91.0, 0.0),
            Err(ValidationError::InvalidLatitude(91.0))
        );
        assert_eq!(
            Location::new(0.0, -180.5),
            Err(ValidationError::InvalidLongitude(-180.5))
        );
        assert!(Location::new(f64::NAN, 0.0).is_err());
        assert!(Location::new(90.0, 180.0).is_ok());
        assert!(Location::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_display_labels() {
        let nyc = Location::new(40.71, -74.01)
            .unwrap()
            .with_labels(Some("New York".into()), Some("USA".into()));
        assert_eq!(nyc.to_string(), "40.7100°N, 74.0100°W (New York, USA)");
    }

    #[test]
    fn test_timezone_lookup() {
        let nyc = Location::new(40.71, -74.01).unwrap();
        assert_eq!(nyc.timezone(), chrono_tz::America::New_York);
        let tokyo = Location::new(35.6762, 139.6503).unwrap();
        assert_eq!(tokyo.timezone(), chrono_tz::Asia::Tokyo);
    }
}
