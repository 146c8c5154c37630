use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::bid::{Bid, BidStatus};
use crate::models::commission::Commission;
use crate::models::driver::Driver;
use crate::models::notification::Notification;
use crate::models::rating::{Party, Rating};
use crate::models::ride::Ride;
use crate::models::shipper::Shipper;

const COMMISSION_KEY: &str = "platform";

/// Exclusive handle on one ride. Every multi-entity write that must be atomic
/// runs while one of these is held. Never hold two at once.
pub type RideGuard<'a> = RefMut<'a, Uuid, Ride>;

/// In-process entity store.
///
/// Lock order: a ride guard first, then at most one guard from any other
/// table at a time. The bid tables are private so the pending-bid index can
/// only change together with the bid it points at.
#[derive(Default)]
pub struct Store {
    pub shippers: DashMap<Uuid, Shipper>,
    pub drivers: DashMap<Uuid, Driver>,
    pub rides: DashMap<Uuid, Ride>,
    pub ratings: DashMap<Uuid, Rating>,
    pub notifications: DashMap<Uuid, Notification>,
    pub(crate) bids: DashMap<Uuid, Bid>,
    /// Partial unique index over (ride, driver) restricted to Pending bids.
    pending_bids: DashMap<(Uuid, Uuid), Uuid>,
    driver_phones: DashMap<String, Uuid>,
    commission: DashMap<&'static str, Commission>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ride(&self, id: Uuid) -> Result<Ride, AppError> {
        self.rides
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("ride {id} not found")))
    }

    pub fn lock_ride(&self, id: Uuid) -> Result<RideGuard<'_>, AppError> {
        self.rides
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("ride {id} not found")))
    }

    pub fn rides_where<F>(&self, predicate: F) -> Vec<Ride>
    where
        F: Fn(&Ride) -> bool,
    {
        let mut rides: Vec<Ride> = self
            .rides
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        rides.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rides
    }

    pub fn shipper(&self, id: Uuid) -> Result<Shipper, AppError> {
        self.shippers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("shipper {id} not found")))
    }

    pub fn driver(&self, id: Uuid) -> Result<Driver, AppError> {
        self.drivers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))
    }

    /// Registers a driver, enforcing phone uniqueness at insert time.
    pub fn insert_driver(&self, driver: Driver) -> Result<Driver, AppError> {
        match self.driver_phones.entry(driver.phone.clone()) {
            Entry::Occupied(existing) => Err(AppError::Conflict(format!(
                "phone {} is already registered to driver {}",
                driver.phone,
                existing.get()
            ))),
            Entry::Vacant(slot) => {
                self.drivers.insert(driver.id, driver.clone());
                slot.insert(driver.id);
                Ok(driver)
            }
        }
    }

    /// Runs `apply` against the driver while holding its entry.
    pub fn update_driver<T, F>(&self, id: Uuid, apply: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Driver) -> Result<T, AppError>,
    {
        let mut driver = self
            .drivers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;
        apply(driver.value_mut())
    }

    pub fn bid(&self, id: Uuid) -> Result<Bid, AppError> {
        self.bids
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("bid {id} not found")))
    }

    /// Bids on a ride, newest first.
    pub fn bids_for_ride(&self, ride_id: Uuid) -> Vec<Bid> {
        let mut bids: Vec<Bid> = self
            .bids
            .iter()
            .filter(|entry| entry.value().ride_id == ride_id)
            .map(|entry| entry.value().clone())
            .collect();
        bids.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bids
    }

    pub fn pending_bid(&self, ride_id: Uuid, driver_id: Uuid) -> Option<Uuid> {
        self.pending_bids
            .get(&(ride_id, driver_id))
            .map(|entry| *entry.value())
    }

    /// Inserts a Pending bid. The index slot stays locked between the
    /// duplicate check and the write, so two racing inserts cannot both land.
    pub fn insert_pending_bid(&self, bid: Bid) -> Result<Bid, AppError> {
        if bid.status != BidStatus::Pending {
            return Err(AppError::Internal(format!(
                "bid {} must be pending on insert",
                bid.id
            )));
        }

        match self.pending_bids.entry((bid.ride_id, bid.driver_id)) {
            Entry::Occupied(existing) => Err(AppError::PendingBidExists {
                bid_id: *existing.get(),
            }),
            Entry::Vacant(slot) => {
                self.bids.insert(bid.id, bid.clone());
                slot.insert(bid.id);
                Ok(bid)
            }
        }
    }

    /// Moves a bid to `status`, keeping the pending index in step.
    pub fn set_bid_status(&self, id: Uuid, status: BidStatus) -> Result<Bid, AppError> {
        let (previous, updated) = {
            let mut bid = self
                .bids
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("bid {id} not found")))?;
            let previous = bid.status;
            bid.status = status;
            bid.updated_at = Utc::now();
            (previous, bid.clone())
        };

        if previous == BidStatus::Pending && status != BidStatus::Pending {
            self.pending_bids
                .remove_if(&(updated.ride_id, updated.driver_id), |_, bid_id| {
                    *bid_id == id
                });
        }

        Ok(updated)
    }

    /// Current commission, created with 0% on first access.
    pub fn commission(&self) -> Commission {
        self.commission
            .entry(COMMISSION_KEY)
            .or_default()
            .value()
            .clone()
    }

    pub fn set_commission_percent(&self, percent: f64) -> Commission {
        let mut commission = self.commission.entry(COMMISSION_KEY).or_default();
        commission.percent = percent;
        commission.updated_at = Utc::now();
        commission.value().clone()
    }

    pub fn insert_rating(&self, rating: Rating) -> Rating {
        self.ratings.insert(rating.id, rating.clone());
        rating
    }

    /// Ratings received by `ratee`, newest first.
    pub fn ratings_for(&self, ratee: Party) -> Vec<Rating> {
        let mut ratings: Vec<Rating> = self
            .ratings
            .iter()
            .filter(|entry| entry.value().ratee == ratee)
            .map(|entry| entry.value().clone())
            .collect();
        ratings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        ratings
    }

    pub fn push_notification(&self, notification: Notification) {
        self.notifications
            .insert(notification.id, notification);
    }

    pub fn notifications_for(&self, user_id: Uuid) -> Vec<Notification> {
        let mut notifications: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notifications
    }
}
