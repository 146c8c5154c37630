use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::location::GeoPoint;

pub const MIN_VEHICLE_SIZE_FEET: u16 = 6;
pub const MAX_VEHICLE_SIZE_FEET: u16 = 180;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "String")]
pub enum VehicleCategory {
    Trailer,
    Container,
    Dumper,
    Flatbed,
    Tanker,
    Reefer,
    Pickup,
    MiniTruck,
    Truck,
    Other,
    #[default]
    Uncategorized,
}

impl VehicleCategory {
    pub const ALL: [VehicleCategory; 11] = [
        VehicleCategory::Trailer,
        VehicleCategory::Container,
        VehicleCategory::Dumper,
        VehicleCategory::Flatbed,
        VehicleCategory::Tanker,
        VehicleCategory::Reefer,
        VehicleCategory::Pickup,
        VehicleCategory::MiniTruck,
        VehicleCategory::Truck,
        VehicleCategory::Other,
        VehicleCategory::Uncategorized,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleCategory::Trailer => "Trailer",
            VehicleCategory::Container => "Container",
            VehicleCategory::Dumper => "Dumper",
            VehicleCategory::Flatbed => "Flatbed",
            VehicleCategory::Tanker => "Tanker",
            VehicleCategory::Reefer => "Reefer",
            VehicleCategory::Pickup => "Pickup",
            VehicleCategory::MiniTruck => "MiniTruck",
            VehicleCategory::Truck => "Truck",
            VehicleCategory::Other => "Other",
            VehicleCategory::Uncategorized => "Uncategorized",
        }
    }
}

impl fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleCategory {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AppError::InvalidInput(format!("unknown vehicle category: {raw}")))
    }
}

impl TryFrom<String> for VehicleCategory {
    type Error = AppError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

/// Accepts the wire value as a plain integer so negative or oversized input
/// is reported as invalid rather than failing deserialization.
pub fn validate_vehicle_size(size: Option<i64>) -> Result<Option<u16>, AppError> {
    let Some(feet) = size else {
        return Ok(None);
    };
    u16::try_from(feet)
        .ok()
        .filter(|feet| (MIN_VEHICLE_SIZE_FEET..=MAX_VEHICLE_SIZE_FEET).contains(feet))
        .map(Some)
        .ok_or_else(|| {
            AppError::InvalidInput(format!(
                "vehicle_size_feet must be between {MIN_VEHICLE_SIZE_FEET} and {MAX_VEHICLE_SIZE_FEET}, got {feet}"
            ))
        })
}

#[derive(Debug, Clone, Serialize)]
pub struct Driver {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub vendor_name: Option<String>,
    pub phone: String,
    pub vehicle_category: VehicleCategory,
    pub vehicle_size_feet: Option<u16>,
    /// Blob-store references keyed by document name.
    pub documents: BTreeMap<String, String>,
    pub online: bool,
    pub location: Option<GeoPoint>,
    pub last_location_update: Option<DateTime<Utc>>,
    /// The ride this driver is committed to, if any. Frozen exactly while set.
    pub active_ride: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    pub fn is_frozen(&self) -> bool {
        self.active_ride.is_some()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn profile(&self) -> DriverProfile {
        DriverProfile {
            name: self.full_name(),
            is_frozen: self.is_frozen(),
            driver: self.clone(),
        }
    }
}

/// Driver as exposed to API clients and event consumers, with derived fields.
#[derive(Debug, Clone, Serialize)]
pub struct DriverProfile {
    #[serde(flatten)]
    pub driver: Driver,
    pub name: String,
    pub is_frozen: bool,
}

#[cfg(test)]
mod tests {
    use super::{validate_vehicle_size, VehicleCategory};

    #[test]
    fn category_parsing_is_case_insensitive() {
        assert_eq!(
            "truck".parse::<VehicleCategory>().unwrap(),
            VehicleCategory::Truck
        );
        assert_eq!(
            " MINITRUCK ".parse::<VehicleCategory>().unwrap(),
            VehicleCategory::MiniTruck
        );
        assert!("spaceship".parse::<VehicleCategory>().is_err());
    }

    #[test]
    fn category_deserializes_to_canonical_spelling() {
        let category: VehicleCategory = serde_json::from_str("\"reefer\"").unwrap();
        assert_eq!(serde_json::to_string(&category).unwrap(), "\"Reefer\"");
    }

    #[test]
    fn vehicle_size_bounds() {
        assert!(validate_vehicle_size(Some(5)).is_err());
        assert!(validate_vehicle_size(Some(181)).is_err());
        assert!(validate_vehicle_size(Some(-20)).is_err());
        assert!(validate_vehicle_size(Some(70_000)).is_err());
        assert_eq!(validate_vehicle_size(Some(20)).unwrap(), Some(20));
        assert_eq!(validate_vehicle_size(None).unwrap(), None);
    }
}
