use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::VehicleCategory;
use crate::models::location::{GeoPoint, Place};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RideStatus {
    Pending,
    Accepted,
    Ongoing,
    Completed,
    Rejected,
}

impl RideStatus {
    /// Statuses in which a ride must carry an assigned driver.
    pub fn requires_driver(self) -> bool {
        matches!(
            self,
            RideStatus::Accepted | RideStatus::Ongoing | RideStatus::Completed
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RouteKind {
    #[default]
    Standard,
    Express,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub shipper_id: Uuid,
    pub shipper_name: String,
    pub pickup: Place,
    pub dropoff: Place,
    pub material_type: String,
    pub vehicle_category: VehicleCategory,
    pub vehicle_size_feet: Option<u16>,
    pub estimated_weight: Option<String>,
    pub route: RouteKind,
    pub offer_fare: f64,
    pub fare_amount: f64,
    pub status: RideStatus,
    pub assigned_driver: Option<Uuid>,
    pub commission_percent: Option<f64>,
    pub commission_amount: Option<f64>,
    pub driver_location: Option<GeoPoint>,
    pub last_location_update: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    pub fn pickup_point(&self) -> Option<GeoPoint> {
        self.pickup.coordinates
    }

    pub fn is_assigned_to(&self, driver_id: Uuid) -> bool {
        self.assigned_driver == Some(driver_id)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
