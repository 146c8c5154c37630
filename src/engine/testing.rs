//! Seed helpers shared by the engine unit tests.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use uuid::Uuid;

use crate::engine::lifecycle::{create_ride, NewRide};
use crate::engine::registry::{register_driver, register_shipper, NewDriver, NewShipper};
use crate::models::driver::Driver;
use crate::models::ride::Ride;
use crate::models::shipper::Shipper;
use crate::models::GeoPoint;
use crate::state::AppState;

static PHONE_SEQ: AtomicU64 = AtomicU64::new(0);

pub fn seed_shipper(state: &AppState) -> Shipper {
    register_shipper(
        state,
        NewShipper {
            name: Some("Indus Cement".to_string()),
            phone: Some("042-111-000".to_string()),
        },
    )
    .unwrap()
}

/// Pending Truck/20ft ride picked up at `(lat, lng)` for a fresh shipper.
pub fn seed_ride(state: &AppState, fare: f64, lat: f64, lng: f64) -> Ride {
    let shipper = seed_shipper(state);
    let ride = create_ride(
        state,
        NewRide {
            shipper_id: Some(shipper.id),
            pickup_location: Some("Lahore".to_string()),
            pickup_coordinates: Some(GeoPoint { lat, lng }),
            dropoff_location: Some("Karachi".to_string()),
            dropoff_coordinates: Some(GeoPoint {
                lat: 24.86,
                lng: 67.01,
            }),
            material_type: Some("Cement".to_string()),
            offer_fare: Some(fare),
            vehicle_category: Some("Truck".to_string()),
            vehicle_size_feet: Some(20),
            ..NewRide::default()
        },
    )
    .unwrap();

    // Keep creation order strict for newest-first assertions.
    std::thread::sleep(std::time::Duration::from_millis(2));
    ride
}

/// Truck/20ft driver, online at `location` when one is given.
pub fn seed_driver(state: &AppState, location: Option<(f64, f64)>) -> Driver {
    let seq = PHONE_SEQ.fetch_add(1, Ordering::Relaxed);
    let profile = register_driver(
        state,
        NewDriver {
            first_name: Some("Asad".to_string()),
            last_name: Some(format!("Driver{seq}")),
            phone: Some(format!("0300{seq:07}-{}", Uuid::new_v4().simple())),
            vehicle_category: Some("Truck".to_string()),
            vehicle_size_feet: Some(20),
            ..NewDriver::default()
        },
    )
    .unwrap();

    state
        .store
        .update_driver(profile.driver.id, |driver| {
            if let Some((lat, lng)) = location {
                driver.online = true;
                driver.location = Some(GeoPoint { lat, lng });
                driver.last_location_update = Some(Utc::now());
            }
            Ok(driver.clone())
        })
        .unwrap()
}
