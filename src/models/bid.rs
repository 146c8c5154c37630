use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BidStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub driver_id: Uuid,
    pub counter_fare: f64,
    pub status: BidStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bid {
    pub fn new(ride_id: Uuid, driver_id: Uuid, counter_fare: f64, note: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            ride_id,
            driver_id,
            counter_fare,
            status: BidStatus::Pending,
            note,
            created_at: now,
            updated_at: now,
        }
    }
}
