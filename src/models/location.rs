use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Builds a point from raw coordinates, rejecting non-finite or out-of-range values.
    pub fn checked(lat: f64, lng: f64) -> Result<Self, AppError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(AppError::InvalidInput(
                "lat and lng must be finite numbers".to_string(),
            ));
        }

        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(AppError::InvalidInput(format!(
                "coordinates out of range: lat={lat}, lng={lng}"
            )));
        }

        Ok(Self { lat, lng })
    }
}

/// Address text as entered by the shipper plus optional coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub address: String,
    pub coordinates: Option<GeoPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationSnapshot {
    pub ride_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub lat: f64,
    pub lng: f64,
    pub last_location_update: DateTime<Utc>,
}
