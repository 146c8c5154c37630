use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::driver::VehicleCategory;
use crate::models::ride::{Ride, RideStatus};
use crate::models::GeoPoint;
use crate::state::AppState;

pub const MATCH_RADIUS_KM: f64 = 30.0;

#[derive(Debug, Clone, Serialize)]
pub struct RideOffer {
    #[serde(flatten)]
    pub ride: Ride,
    pub distance_km: f64,
    /// Badge only; the driver's outstanding pending bid on this ride.
    pub driver_has_bid: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailableRides {
    pub driver_id: Uuid,
    pub vehicle_category: VehicleCategory,
    pub vehicle_size_feet: Option<u16>,
    pub radius_km: f64,
    pub center: GeoPoint,
    pub total: usize,
    pub rides: Vec<RideOffer>,
}

/// Pending rides matching the driver's vehicle exactly and picked up within
/// `MATCH_RADIUS_KM` of the driver's last fix, newest first.
pub fn available_rides(state: &AppState, driver_id: Uuid) -> Result<AvailableRides, AppError> {
    let start = Instant::now();

    let driver = state.store.driver(driver_id)?;
    let center = driver.location.ok_or_else(|| {
        AppError::InvalidState(format!(
            "driver {driver_id} has no location fix; go online first"
        ))
    })?;

    let rides = if driver.is_frozen() {
        debug!(driver_id = %driver_id, "driver is frozen; no offers");
        Vec::new()
    } else {
        let candidates = state.store.rides_where(|ride| {
            ride.status == RideStatus::Pending
                && ride.vehicle_category == driver.vehicle_category
                && ride.vehicle_size_feet == driver.vehicle_size_feet
                // Pending rides never carry a driver; this only screens out corrupted rows.
                && ride
                    .assigned_driver
                    .is_none_or(|assigned| assigned == driver_id)
        });

        let bid_on: HashSet<Uuid> = candidates
            .iter()
            .filter_map(|ride| state.store.pending_bid(ride.id, driver_id).map(|_| ride.id))
            .collect();

        candidates
            .into_iter()
            .filter_map(|ride| {
                let pickup = ride.pickup_point()?;
                let distance_km = haversine_km(&center, &pickup);
                (distance_km <= MATCH_RADIUS_KM).then(|| RideOffer {
                    driver_has_bid: bid_on.contains(&ride.id),
                    distance_km,
                    ride,
                })
            })
            .collect::<Vec<_>>()
    };

    state
        .metrics
        .matching_latency_seconds
        .observe(start.elapsed().as_secs_f64());
    info!(driver_id = %driver_id, offers = rides.len(), "available rides listed");

    Ok(AvailableRides {
        driver_id,
        vehicle_category: driver.vehicle_category,
        vehicle_size_feet: driver.vehicle_size_feet,
        radius_km: MATCH_RADIUS_KM,
        center,
        total: rides.len(),
        rides,
    })
}
