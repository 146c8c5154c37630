use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::engine::rating::average_rating;
use crate::error::AppError;
use crate::models::driver::{validate_vehicle_size, Driver, DriverProfile, VehicleCategory};
use crate::models::notification::Notification;
use crate::models::rating::{Party, PartyKind};
use crate::models::ride::{Ride, RideStatus};
use crate::models::shipper::Shipper;
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewShipper {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDriver {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub vendor_name: Option<String>,
    pub phone: Option<String>,
    pub vehicle_category: Option<String>,
    pub vehicle_size_feet: Option<i64>,
    #[serde(default)]
    pub documents: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DriverDetails {
    #[serde(flatten)]
    pub profile: DriverProfile,
    pub average_rating: f64,
    pub rating_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleStats {
    pub stats: BTreeMap<String, usize>,
    pub total: usize,
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| AppError::InvalidInput(format!("{field} is required")))
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|text| !text.is_empty())
}

pub fn register_shipper(state: &AppState, input: NewShipper) -> Result<Shipper, AppError> {
    let shipper = Shipper {
        id: Uuid::new_v4(),
        name: required(input.name, "name")?,
        phone: required(input.phone, "phone")?,
        created_at: Utc::now(),
    };

    state.store.shippers.insert(shipper.id, shipper.clone());
    info!(shipper_id = %shipper.id, "shipper registered");
    Ok(shipper)
}

pub fn register_driver(state: &AppState, input: NewDriver) -> Result<DriverProfile, AppError> {
    let vehicle_category = match optional(input.vehicle_category) {
        Some(raw) => raw.parse::<VehicleCategory>()?,
        None => VehicleCategory::default(),
    };

    if let Some((name, _)) = input
        .documents
        .iter()
        .find(|(name, reference)| name.trim().is_empty() || reference.trim().is_empty())
    {
        return Err(AppError::InvalidInput(format!(
            "document reference {name:?} must have a name and a non-empty reference"
        )));
    }

    let now = Utc::now();
    let driver = Driver {
        id: Uuid::new_v4(),
        first_name: required(input.first_name, "first_name")?,
        last_name: required(input.last_name, "last_name")?,
        vendor_name: optional(input.vendor_name),
        phone: required(input.phone, "phone")?,
        vehicle_category,
        vehicle_size_feet: validate_vehicle_size(input.vehicle_size_feet)?,
        documents: input.documents,
        online: false,
        location: None,
        last_location_update: None,
        active_ride: None,
        created_at: now,
        updated_at: now,
    };

    let driver = state.store.insert_driver(driver)?;
    info!(driver_id = %driver.id, category = %driver.vehicle_category, "driver registered");
    Ok(driver.profile())
}

pub fn list_drivers(state: &AppState) -> Vec<DriverProfile> {
    let mut drivers: Vec<DriverProfile> = state
        .store
        .drivers
        .iter()
        .map(|entry| entry.value().profile())
        .collect();
    drivers.sort_by(|a, b| b.driver.created_at.cmp(&a.driver.created_at));
    drivers
}

pub fn driver_details(state: &AppState, driver_id: Uuid) -> Result<DriverDetails, AppError> {
    let driver = state.store.driver(driver_id)?;
    let summary = average_rating(
        state,
        Party {
            kind: PartyKind::Driver,
            id: driver_id,
        },
    );

    Ok(DriverDetails {
        profile: driver.profile(),
        average_rating: summary.average,
        rating_count: summary.count,
    })
}

pub fn set_driver_online(
    state: &AppState,
    driver_id: Uuid,
    online: bool,
) -> Result<DriverProfile, AppError> {
    let profile = state.store.update_driver(driver_id, |driver| {
        driver.online = online;
        driver.updated_at = Utc::now();
        Ok(driver.profile())
    })?;

    info!(driver_id = %driver_id, online, "driver availability changed");
    Ok(profile)
}

/// The ride the driver is committed to, if any.
pub fn current_ride(state: &AppState, driver_id: Uuid) -> Result<Option<Ride>, AppError> {
    let driver = state.store.driver(driver_id)?;
    Ok(driver
        .active_ride
        .and_then(|ride_id| state.store.ride(ride_id).ok()))
}

pub fn completed_rides(state: &AppState, driver_id: Uuid) -> Result<Vec<Ride>, AppError> {
    state.store.driver(driver_id)?;
    Ok(state.store.rides_where(|ride| {
        ride.status == RideStatus::Completed && ride.is_assigned_to(driver_id)
    }))
}

pub fn shipper_rides(state: &AppState, shipper_id: Uuid) -> Result<Vec<Ride>, AppError> {
    state.store.shipper(shipper_id)?;
    Ok(state.store.rides_where(|ride| ride.shipper_id == shipper_id))
}

pub fn shipper_notifications(
    state: &AppState,
    shipper_id: Uuid,
) -> Result<Vec<Notification>, AppError> {
    state.store.shipper(shipper_id)?;
    Ok(state.store.notifications_for(shipper_id))
}

pub fn vehicle_stats(state: &AppState) -> VehicleStats {
    let mut stats: BTreeMap<String, usize> = VehicleCategory::ALL
        .iter()
        .map(|category| (category.as_str().to_string(), 0))
        .collect();

    let mut total = 0;
    for entry in state.store.drivers.iter() {
        *stats
            .entry(entry.value().vehicle_category.as_str().to_string())
            .or_default() += 1;
        total += 1;
    }

    VehicleStats { stats, total }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::lifecycle::{accept_ride_direct, complete_ride};
    use crate::engine::testing::{seed_driver, seed_ride};

    fn new_driver(phone: &str) -> NewDriver {
        NewDriver {
            first_name: Some("Imran".to_string()),
            last_name: Some("Khan".to_string()),
            phone: Some(phone.to_string()),
            vehicle_category: Some("flatbed".to_string()),
            vehicle_size_feet: Some(40),
            ..NewDriver::default()
        }
    }

    #[test]
    fn duplicate_phone_is_a_conflict() {
        let state = AppState::new(16);
        register_driver(&state, new_driver("03001234567")).unwrap();

        assert!(matches!(
            register_driver(&state, new_driver("03001234567")),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn category_defaults_and_normalises() {
        let state = AppState::new(16);
        let flatbed = register_driver(&state, new_driver("1")).unwrap();
        assert_eq!(flatbed.driver.vehicle_category, VehicleCategory::Flatbed);

        let mut bare = new_driver("2");
        bare.vehicle_category = None;
        let bare = register_driver(&state, bare).unwrap();
        assert_eq!(bare.driver.vehicle_category, VehicleCategory::Uncategorized);
        assert!(!bare.is_frozen);

        let mut oversize = new_driver("3");
        oversize.vehicle_size_feet = Some(400);
        assert!(matches!(
            register_driver(&state, oversize),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn vehicle_stats_lists_every_category() {
        let state = AppState::new(16);
        register_driver(&state, new_driver("1")).unwrap();
        register_driver(&state, new_driver("2")).unwrap();

        let stats = vehicle_stats(&state);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.stats.len(), VehicleCategory::ALL.len());
        assert_eq!(stats.stats["Flatbed"], 2);
        assert_eq!(stats.stats["Truck"], 0);
    }

    #[test]
    fn current_and_completed_rides_follow_the_assignment() {
        let state = AppState::new(16);
        let ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let driver = seed_driver(&state, None);

        assert!(current_ride(&state, driver.id).unwrap().is_none());
        accept_ride_direct(&state, ride.id, driver.id).unwrap();
        assert_eq!(current_ride(&state, driver.id).unwrap().map(|r| r.id), Some(ride.id));

        complete_ride(&state, ride.id).unwrap();
        assert!(current_ride(&state, driver.id).unwrap().is_none());
        let done = completed_rides(&state, driver.id).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, ride.id);
    }
}
