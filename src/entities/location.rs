// 📍 Location Entity - a point on the map that can be explored
//
// Coordinates are fixed at creation; only the timestamps move afterwards.

use serde::{Deserialize, Serialize};

use super::Timestamps;
use crate::error::{Result, StoreError};

pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;
pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;

// ============================================================================
// LOCATION ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub longitude: f64,
    pub latitude: f64,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

// ============================================================================
// CREATION INPUT
// ============================================================================

/// Payload for creating a location (HTTP body, CSV row, CLI).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewLocation {
    pub longitude: f64,
    pub latitude: f64,
}

impl NewLocation {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        NewLocation {
            longitude,
            latitude,
        }
    }

    /// Reject coordinates outside the WGS84 ranges. NaN never passes.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_LONGITUDE..=MAX_LONGITUDE).contains(&self.longitude) {
            return Err(StoreError::validation(
                "longitude",
                "Longitude must be between -180 and 180",
            ));
        }
        if !(MIN_LATITUDE..=MAX_LATITUDE).contains(&self.latitude) {
            return Err(StoreError::validation(
                "latitude",
                "Latitude must be between -90 and 90",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_coordinates() {
        assert!(NewLocation::new(0.0, 0.0).validate().is_ok());
        assert!(NewLocation::new(-180.0, -90.0).validate().is_ok());
        assert!(NewLocation::new(180.0, 90.0).validate().is_ok());
        assert!(NewLocation::new(-74.0721, 4.7110).validate().is_ok());
    }

    #[test]
    fn test_longitude_out_of_range() {
        let err = NewLocation::new(180.5, 0.0).validate().unwrap_err();
        match err {
            StoreError::Validation { field, .. } => assert_eq!(field, "longitude"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_latitude_out_of_range() {
        let err = NewLocation::new(0.0, -91.0).validate().unwrap_err();
        match err {
            StoreError::Validation { field, .. } => assert_eq!(field, "latitude"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_nan_rejected() {
        assert!(NewLocation::new(f64::NAN, 0.0).validate().is_err());
        assert!(NewLocation::new(0.0, f64::NAN).validate().is_err());
    }

    #[test]
    fn test_location_json_is_flat() {
        let now = chrono::Utc::now();
        let location = Location {
            id: 3,
            longitude: 1.5,
            latitude: -2.5,
            timestamps: Timestamps::at(now),
        };

        let json = serde_json::to_value(&location).unwrap();
        assert_eq!(json["id"], 3);
        assert!(json.get("created_at").is_some());
        assert!(json.get("updated_at").is_some());
        assert!(json.get("timestamps").is_none());
    }
}
