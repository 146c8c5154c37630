use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::notifier::{emit, notify_user};
use crate::error::AppError;
use crate::models::bid::BidStatus;
use crate::models::driver::{validate_vehicle_size, Driver, VehicleCategory};
use crate::models::event::DomainEvent;
use crate::models::location::{GeoPoint, LocationSnapshot, Place};
use crate::models::notification::NotificationKind;
use crate::models::ride::{Ride, RideStatus, RouteKind};
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewRide {
    pub shipper_id: Option<Uuid>,
    pub pickup_location: Option<String>,
    pub pickup_coordinates: Option<GeoPoint>,
    pub dropoff_location: Option<String>,
    pub dropoff_coordinates: Option<GeoPoint>,
    pub material_type: Option<String>,
    pub offer_fare: Option<f64>,
    pub vehicle_category: Option<String>,
    pub vehicle_size_feet: Option<i64>,
    pub estimated_weight: Option<String>,
    pub route: Option<RouteKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RideLocation {
    pub ride_id: Uuid,
    pub assigned_driver: Uuid,
    pub status: RideStatus,
    pub driver_lat: Option<f64>,
    pub driver_lng: Option<f64>,
    pub last_location_update: Option<DateTime<Utc>>,
}

fn required_text(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| AppError::InvalidInput(format!("{field} is required")))
}

fn checked_point(point: Option<GeoPoint>) -> Result<Option<GeoPoint>, AppError> {
    point
        .map(|p| GeoPoint::checked(p.lat, p.lng))
        .transpose()
}

pub fn create_ride(state: &AppState, input: NewRide) -> Result<Ride, AppError> {
    let shipper_id = input
        .shipper_id
        .ok_or_else(|| AppError::InvalidInput("shipper_id is required".to_string()))?;
    let shipper = state.store.shipper(shipper_id)?;

    let pickup_address = required_text(input.pickup_location, "pickup_location")?;
    let dropoff_address = required_text(input.dropoff_location, "dropoff_location")?;
    let material_type = required_text(input.material_type, "material_type")?;
    let vehicle_category: VehicleCategory =
        required_text(input.vehicle_category, "vehicle_category")?.parse()?;

    let offer_fare = input
        .offer_fare
        .ok_or_else(|| AppError::InvalidInput("offer_fare is required".to_string()))?;
    if !offer_fare.is_finite() || offer_fare < 0.0 {
        return Err(AppError::InvalidInput(
            "offer_fare must be a non-negative number".to_string(),
        ));
    }

    let now = Utc::now();
    let ride = Ride {
        id: Uuid::new_v4(),
        shipper_id,
        shipper_name: shipper.name,
        pickup: Place {
            address: pickup_address,
            coordinates: checked_point(input.pickup_coordinates)?,
        },
        dropoff: Place {
            address: dropoff_address,
            coordinates: checked_point(input.dropoff_coordinates)?,
        },
        material_type,
        vehicle_category,
        vehicle_size_feet: validate_vehicle_size(input.vehicle_size_feet)?,
        estimated_weight: input.estimated_weight,
        route: input.route.unwrap_or_default(),
        offer_fare,
        fare_amount: offer_fare,
        status: RideStatus::Pending,
        assigned_driver: None,
        commission_percent: None,
        commission_amount: None,
        driver_location: None,
        last_location_update: None,
        created_at: now,
        updated_at: now,
    };

    state.store.rides.insert(ride.id, ride.clone());
    state.metrics.ride_transition("created");
    info!(ride_id = %ride.id, shipper_id = %shipper_id, category = %ride.vehicle_category, "ride created");

    notify_user(
        state,
        shipper_id,
        NotificationKind::Ride,
        "Ride Created",
        "Your ride has been created successfully.",
    );
    emit(
        state,
        DomainEvent::RideCreated {
            ride_id: ride.id,
            shipper_id,
        },
    );

    Ok(ride)
}

/// Commits `driver_id` to `ride`. The caller must hold the ride guard.
///
/// The driver's `active_ride` is the one place the "one active ride per
/// driver" rule lives; both acceptance paths go through here.
pub(crate) fn assign_driver(
    state: &AppState,
    ride: &mut Ride,
    driver_id: Uuid,
) -> Result<Driver, AppError> {
    let ride_id = ride.id;
    let driver = state.store.update_driver(driver_id, |driver| {
        match driver.active_ride {
            Some(active) if active != ride_id => Err(AppError::Conflict(format!(
                "driver {driver_id} is already committed to ride {active}"
            ))),
            _ => {
                driver.active_ride = Some(ride_id);
                driver.updated_at = Utc::now();
                Ok(driver.clone())
            }
        }
    })?;

    ride.assigned_driver = Some(driver_id);
    ride.status = RideStatus::Accepted;
    ride.touch();

    Ok(driver)
}

/// Unfreezes the driver if it is still committed to `ride_id`.
pub(crate) fn release_driver(state: &AppState, driver_id: Uuid, ride_id: Uuid) {
    let released = state.store.update_driver(driver_id, |driver| {
        if driver.active_ride == Some(ride_id) {
            driver.active_ride = None;
            driver.updated_at = Utc::now();
        }
        Ok(())
    });

    if let Err(err) = released {
        warn!(driver_id = %driver_id, ride_id = %ride_id, error = %err, "could not release driver");
    }
}

pub fn accept_ride_direct(
    state: &AppState,
    ride_id: Uuid,
    driver_id: Uuid,
) -> Result<Ride, AppError> {
    let (ride, withdrawn) = {
        let mut ride = state.store.lock_ride(ride_id)?;

        if ride.is_assigned_to(driver_id) && ride.status.requires_driver() {
            return Ok(ride.clone());
        }
        if let Some(assigned) = ride.assigned_driver {
            return Err(AppError::Conflict(format!(
                "ride {ride_id} is already assigned to driver {assigned}"
            )));
        }
        if ride.status != RideStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "ride {ride_id} is {:?} and cannot be accepted",
                ride.status
            )));
        }

        assign_driver(state, &mut ride, driver_id)?;

        // The driver took the offered fare, so the bidding round is over.
        let mut withdrawn = Vec::new();
        for bid in state.store.bids_for_ride(ride_id) {
            if bid.status == BidStatus::Pending {
                state.store.set_bid_status(bid.id, BidStatus::Rejected)?;
                withdrawn.push(bid.id);
            }
        }

        (ride.clone(), withdrawn)
    };

    state.metrics.ride_transition("accepted");
    info!(ride_id = %ride_id, driver_id = %driver_id, withdrawn_bids = withdrawn.len(), "ride accepted directly");

    notify_user(
        state,
        ride.shipper_id,
        NotificationKind::Ride,
        "Ride Accepted",
        "A driver has accepted your ride.",
    );
    for bid_id in withdrawn {
        emit(
            state,
            DomainEvent::BidUpdated {
                ride_id,
                bid_id,
                status: BidStatus::Rejected,
            },
        );
    }
    emit(state, DomainEvent::RideAccepted { ride_id, driver_id });

    Ok(ride)
}

pub fn start_ride(state: &AppState, ride_id: Uuid) -> Result<Ride, AppError> {
    let ride = {
        let mut ride = state.store.lock_ride(ride_id)?;
        if ride.status != RideStatus::Accepted {
            return Err(AppError::InvalidState(format!(
                "ride {ride_id} is {:?}; only accepted rides can start",
                ride.status
            )));
        }
        ride.status = RideStatus::Ongoing;
        ride.touch();
        ride.clone()
    };

    state.metrics.ride_transition("started");
    info!(ride_id = %ride_id, "ride started");
    emit(
        state,
        DomainEvent::RideUpdated {
            ride_id,
            status: ride.status,
        },
    );

    Ok(ride)
}

pub fn complete_ride(state: &AppState, ride_id: Uuid) -> Result<Ride, AppError> {
    let ride = {
        let mut ride = state.store.lock_ride(ride_id)?;

        match ride.status {
            RideStatus::Accepted | RideStatus::Ongoing => {}
            RideStatus::Completed => {
                return Err(AppError::Conflict(format!(
                    "ride {ride_id} is already completed"
                )));
            }
            RideStatus::Pending | RideStatus::Rejected => {
                return Err(AppError::InvalidState(format!(
                    "ride {ride_id} is {:?}; only assigned rides can complete",
                    ride.status
                )));
            }
        }

        let commission = state.store.commission();
        let amount = commission.amount_for(ride.fare_amount);

        if let Some(driver_id) = ride.assigned_driver {
            release_driver(state, driver_id, ride_id);
        }

        ride.status = RideStatus::Completed;
        ride.commission_percent = Some(commission.percent);
        ride.commission_amount = Some(amount);
        ride.touch();
        ride.clone()
    };

    let percent = ride.commission_percent.unwrap_or_default();
    let amount = ride.commission_amount.unwrap_or_default();

    state.metrics.ride_transition("completed");
    state.metrics.commission_accrued_total.inc_by(amount);
    info!(ride_id = %ride_id, fare = ride.fare_amount, commission_percent = percent, commission_amount = amount, "ride completed");

    emit(
        state,
        DomainEvent::RideCompleted {
            ride_id,
            driver_id: ride.assigned_driver,
            commission_percent: percent,
            commission_amount: amount,
        },
    );

    Ok(ride)
}

/// Closes a Pending or Accepted ride without completing it.
pub fn reject_ride(state: &AppState, ride_id: Uuid) -> Result<Ride, AppError> {
    let (ride, rejected_bids) = {
        let mut ride = state.store.lock_ride(ride_id)?;

        if !matches!(ride.status, RideStatus::Pending | RideStatus::Accepted) {
            return Err(AppError::InvalidState(format!(
                "ride {ride_id} is {:?} and cannot be rejected",
                ride.status
            )));
        }

        if let Some(driver_id) = ride.assigned_driver.take() {
            release_driver(state, driver_id, ride_id);
        }

        let mut rejected_bids = Vec::new();
        for bid in state.store.bids_for_ride(ride_id) {
            if bid.status != BidStatus::Rejected {
                state.store.set_bid_status(bid.id, BidStatus::Rejected)?;
                rejected_bids.push(bid.id);
            }
        }

        ride.status = RideStatus::Rejected;
        ride.touch();
        (ride.clone(), rejected_bids)
    };

    state.metrics.ride_transition("rejected");
    info!(ride_id = %ride_id, rejected_bids = rejected_bids.len(), "ride rejected");

    for bid_id in rejected_bids {
        emit(
            state,
            DomainEvent::BidUpdated {
                ride_id,
                bid_id,
                status: BidStatus::Rejected,
            },
        );
    }
    emit(
        state,
        DomainEvent::RideUpdated {
            ride_id,
            status: ride.status,
        },
    );

    Ok(ride)
}

/// Administrative purge. Bids stay behind for audit.
pub fn purge_ride(state: &AppState, ride_id: Uuid) -> Result<Ride, AppError> {
    let removed = state.store.rides.remove_if(&ride_id, |_, ride| {
        !matches!(ride.status, RideStatus::Accepted | RideStatus::Ongoing)
    });

    let Some((_, ride)) = removed else {
        let ride = state.store.ride(ride_id)?;
        return Err(AppError::InvalidState(format!(
            "ride {ride_id} is {:?} and cannot be purged",
            ride.status
        )));
    };

    for bid in state.store.bids_for_ride(ride_id) {
        if bid.status == BidStatus::Pending {
            state.store.set_bid_status(bid.id, BidStatus::Rejected)?;
        }
    }

    warn!(ride_id = %ride_id, status = ?ride.status, "ride purged");
    Ok(ride)
}

pub fn update_ride_location(
    state: &AppState,
    ride_id: Uuid,
    lat: f64,
    lng: f64,
) -> Result<LocationSnapshot, AppError> {
    let point = GeoPoint::checked(lat, lng)?;
    let now = Utc::now();

    let driver_id = {
        let mut ride = state.store.lock_ride(ride_id)?;
        ride.driver_location = Some(point);
        ride.last_location_update = Some(now);
        ride.assigned_driver
    };

    let snapshot = LocationSnapshot {
        ride_id: Some(ride_id),
        driver_id,
        lat: point.lat,
        lng: point.lng,
        last_location_update: now,
    };
    publish_location(state, &snapshot);

    Ok(snapshot)
}

/// Records a driver's position and mirrors it onto the ride it is committed to.
pub fn update_driver_location(
    state: &AppState,
    driver_id: Uuid,
    lat: f64,
    lng: f64,
) -> Result<LocationSnapshot, AppError> {
    let point = GeoPoint::checked(lat, lng)?;
    let now = Utc::now();

    let active_ride = state.store.update_driver(driver_id, |driver| {
        driver.location = Some(point);
        driver.last_location_update = Some(now);
        driver.updated_at = now;
        Ok(driver.active_ride)
    })?;

    if let Some(ride_id) = active_ride {
        if let Ok(mut ride) = state.store.lock_ride(ride_id) {
            ride.driver_location = Some(point);
            ride.last_location_update = Some(now);
        }
    }

    let snapshot = LocationSnapshot {
        ride_id: active_ride,
        driver_id: Some(driver_id),
        lat: point.lat,
        lng: point.lng,
        last_location_update: now,
    };
    publish_location(state, &snapshot);

    Ok(snapshot)
}

fn publish_location(state: &AppState, snapshot: &LocationSnapshot) {
    emit(
        state,
        DomainEvent::DriverLocationUpdate {
            driver_id: snapshot.driver_id,
            ride_id: snapshot.ride_id,
            lat: snapshot.lat,
            lng: snapshot.lng,
            last_location_update: snapshot.last_location_update,
        },
    );
}

pub fn driver_location(state: &AppState, ride_id: Uuid) -> Result<RideLocation, AppError> {
    let ride = state.store.ride(ride_id)?;
    let assigned_driver = ride.assigned_driver.ok_or_else(|| {
        AppError::InvalidState(format!("no driver assigned to ride {ride_id}"))
    })?;

    Ok(RideLocation {
        ride_id,
        assigned_driver,
        status: ride.status,
        driver_lat: ride.driver_location.map(|p| p.lat),
        driver_lng: ride.driver_location.map(|p| p.lng),
        last_location_update: ride.last_location_update,
    })
}
