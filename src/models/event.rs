use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::bid::BidStatus;
use crate::models::driver::DriverProfile;
use crate::models::ride::{Ride, RideStatus};

/// Domain events handed to the real-time broadcaster.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum DomainEvent {
    #[serde(rename = "ride.created")]
    RideCreated { ride_id: Uuid, shipper_id: Uuid },

    #[serde(rename = "bid.placed")]
    BidPlaced {
        ride_id: Uuid,
        driver_id: Uuid,
        bid_id: Uuid,
        counter_fare: f64,
    },

    #[serde(rename = "bid.accepted")]
    BidAccepted {
        bid_id: Uuid,
        ride: Box<Ride>,
        driver: Box<DriverProfile>,
    },

    #[serde(rename = "bid.updated")]
    BidUpdated {
        ride_id: Uuid,
        bid_id: Uuid,
        status: BidStatus,
    },

    #[serde(rename = "ride.accepted")]
    RideAccepted { ride_id: Uuid, driver_id: Uuid },

    #[serde(rename = "ride.updated")]
    RideUpdated { ride_id: Uuid, status: RideStatus },

    #[serde(rename = "ride.completed")]
    RideCompleted {
        ride_id: Uuid,
        driver_id: Option<Uuid>,
        commission_percent: f64,
        commission_amount: f64,
    },

    #[serde(rename = "driver.locationUpdate")]
    DriverLocationUpdate {
        driver_id: Option<Uuid>,
        ride_id: Option<Uuid>,
        lat: f64,
        lng: f64,
        last_location_update: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::RideCreated { .. } => "ride.created",
            DomainEvent::BidPlaced { .. } => "bid.placed",
            DomainEvent::BidAccepted { .. } => "bid.accepted",
            DomainEvent::BidUpdated { .. } => "bid.updated",
            DomainEvent::RideAccepted { .. } => "ride.accepted",
            DomainEvent::RideUpdated { .. } => "ride.updated",
            DomainEvent::RideCompleted { .. } => "ride.completed",
            DomainEvent::DriverLocationUpdate { .. } => "driver.locationUpdate",
        }
    }
}
