use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::lifecycle::{assign_driver, release_driver};
use crate::engine::notifier::{emit, notify_user};
use crate::error::AppError;
use crate::models::bid::{Bid, BidStatus};
use crate::models::event::DomainEvent;
use crate::models::notification::NotificationKind;
use crate::models::ride::{Ride, RideStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct RepairedRide {
    pub ride_id: Uuid,
    pub kept_bid_id: Uuid,
    pub assigned_driver: Uuid,
    pub rejected_bid_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct RepairReport {
    pub affected_rides: usize,
    pub details: Vec<RepairedRide>,
}

pub fn submit_bid(
    state: &AppState,
    ride_id: Uuid,
    driver_id: Uuid,
    counter_fare: f64,
    note: Option<String>,
) -> Result<Bid, AppError> {
    if !counter_fare.is_finite() || counter_fare <= 0.0 {
        return Err(AppError::InvalidInput(
            "counter_fare must be a positive number".to_string(),
        ));
    }
    let note = note
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    let (bid, shipper_id) = {
        // Held so a bid cannot slip in after an acceptance closed the ride.
        let ride = state.store.lock_ride(ride_id)?;

        if ride.status != RideStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "ride {ride_id} is {:?} and no longer open for bids",
                ride.status
            )));
        }
        state.store.driver(driver_id)?;

        let inserted = state
            .store
            .insert_pending_bid(Bid::new(ride_id, driver_id, counter_fare, note));
        if let Err(AppError::PendingBidExists { bid_id }) = &inserted {
            state.metrics.bid_outcome("duplicate");
            warn!(ride_id = %ride_id, driver_id = %driver_id, existing_bid_id = %bid_id, "duplicate pending bid refused");
        }

        (inserted?, ride.shipper_id)
    };

    state.metrics.bid_outcome("placed");
    info!(ride_id = %ride_id, driver_id = %driver_id, bid_id = %bid.id, counter_fare, "bid placed");

    notify_user(
        state,
        shipper_id,
        NotificationKind::Bid,
        "New Bid Received",
        "A driver has placed a bid on your ride.",
    );
    emit(
        state,
        DomainEvent::BidPlaced {
            ride_id,
            driver_id,
            bid_id: bid.id,
            counter_fare: bid.counter_fare,
        },
    );

    Ok(bid)
}

/// Accepts one bid, rejects every other bid on the ride and assigns the ride,
/// all under the ride guard.
pub fn accept_bid(state: &AppState, ride_id: Uuid, bid_id: Uuid) -> Result<Ride, AppError> {
    let (ride, driver, rejected) = {
        let mut ride = state.store.lock_ride(ride_id)?;
        let bid = state.store.bid(bid_id)?;

        if bid.ride_id != ride_id {
            return Err(AppError::Conflict(format!(
                "bid {bid_id} does not belong to ride {ride_id}"
            )));
        }
        if bid.status == BidStatus::Accepted && ride.is_assigned_to(bid.driver_id) {
            return Ok(ride.clone());
        }
        if let Some(assigned) = ride.assigned_driver {
            return Err(AppError::Conflict(format!(
                "ride {ride_id} is already assigned to driver {assigned}"
            )));
        }
        let siblings = state.store.bids_for_ride(ride_id);
        if let Some(other) = siblings
            .iter()
            .find(|other| other.id != bid_id && other.status == BidStatus::Accepted)
        {
            return Err(AppError::Conflict(format!(
                "bid {} is already accepted on ride {ride_id}",
                other.id
            )));
        }
        if ride.status != RideStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "ride {ride_id} is {:?} and cannot accept bids",
                ride.status
            )));
        }
        if bid.status == BidStatus::Rejected {
            return Err(AppError::InvalidState(format!(
                "bid {bid_id} was rejected and cannot be accepted"
            )));
        }

        let driver = assign_driver(state, &mut ride, bid.driver_id)?;
        ride.fare_amount = bid.counter_fare;

        state.store.set_bid_status(bid_id, BidStatus::Accepted)?;
        let mut rejected = Vec::new();
        for other in siblings {
            if other.id != bid_id && other.status != BidStatus::Rejected {
                state.store.set_bid_status(other.id, BidStatus::Rejected)?;
                rejected.push(other.id);
            }
        }

        (ride.clone(), driver, rejected)
    };

    state.metrics.bid_outcome("accepted");
    state.metrics.ride_transition("accepted");
    info!(
        ride_id = %ride_id,
        bid_id = %bid_id,
        driver_id = %driver.id,
        fare = ride.fare_amount,
        auto_rejected = rejected.len(),
        "bid accepted"
    );

    notify_user(
        state,
        ride.shipper_id,
        NotificationKind::Bid,
        "Bid Accepted",
        "You accepted a bid; the driver has been assigned.",
    );
    for other in rejected {
        emit(
            state,
            DomainEvent::BidUpdated {
                ride_id,
                bid_id: other,
                status: BidStatus::Rejected,
            },
        );
    }
    emit(
        state,
        DomainEvent::BidAccepted {
            bid_id,
            ride: Box::new(ride.clone()),
            driver: Box::new(driver.profile()),
        },
    );

    Ok(ride)
}

pub fn reject_bid(state: &AppState, ride_id: Uuid, bid_id: Uuid) -> Result<Bid, AppError> {
    let bid = state.store.bid(bid_id)?;
    if bid.ride_id != ride_id {
        return Err(AppError::Conflict(format!(
            "bid {bid_id} does not belong to ride {ride_id}"
        )));
    }

    let rejected = {
        let _ride = state.store.lock_ride(ride_id)?;
        let current = state.store.bid(bid_id)?;

        match current.status {
            BidStatus::Accepted => {
                return Err(AppError::InvalidState(format!(
                    "bid {bid_id} is accepted and cannot be rejected"
                )));
            }
            BidStatus::Rejected => return Ok(current),
            BidStatus::Pending => state.store.set_bid_status(bid_id, BidStatus::Rejected)?,
        }
    };

    state.metrics.bid_outcome("rejected");
    info!(ride_id = %ride_id, bid_id = %bid_id, "bid rejected");
    emit(
        state,
        DomainEvent::BidUpdated {
            ride_id,
            bid_id,
            status: BidStatus::Rejected,
        },
    );

    Ok(rejected)
}

/// Corrective pass for rides carrying more than one Accepted bid: keeps the
/// most recently updated one and re-synchronizes the ride with it. Completed
/// rides keep their driver, fare and commission snapshot; only the stray
/// acceptances are rejected.
pub fn repair_duplicate_acceptances(state: &AppState) -> Result<RepairReport, AppError> {
    let ride_ids: Vec<Uuid> = state.store.rides.iter().map(|entry| *entry.key()).collect();
    let mut report = RepairReport::default();

    for ride_id in ride_ids {
        let Ok(mut ride) = state.store.lock_ride(ride_id) else {
            continue;
        };

        let mut accepted: Vec<Bid> = state
            .store
            .bids_for_ride(ride_id)
            .into_iter()
            .filter(|bid| bid.status == BidStatus::Accepted)
            .collect();
        if accepted.len() < 2 {
            continue;
        }

        accepted.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then(b.created_at.cmp(&a.created_at))
        });
        // A completed ride is history: the bid it was completed under wins.
        let completed = ride.status == RideStatus::Completed;
        let keep_index = if completed {
            ride.assigned_driver
                .and_then(|driver_id| accepted.iter().position(|bid| bid.driver_id == driver_id))
                .unwrap_or(0)
        } else {
            0
        };
        let keep = accepted.remove(keep_index);

        let mut rejected_bid_ids = Vec::with_capacity(accepted.len());
        for stale in &accepted {
            state.store.set_bid_status(stale.id, BidStatus::Rejected)?;
            if stale.driver_id != keep.driver_id {
                release_driver(state, stale.driver_id, ride_id);
            }
            rejected_bid_ids.push(stale.id);
        }

        if !completed {
            if let Some(previous) = ride.assigned_driver.filter(|id| *id != keep.driver_id) {
                release_driver(state, previous, ride_id);
            }
            ride.assigned_driver = Some(keep.driver_id);
            ride.fare_amount = keep.counter_fare;
            if !ride.status.requires_driver() {
                ride.status = RideStatus::Accepted;
            }

            let frozen = state.store.update_driver(keep.driver_id, |driver| {
                match driver.active_ride {
                    None => {
                        driver.active_ride = Some(ride_id);
                        Ok(true)
                    }
                    Some(active) => Ok(active == ride_id),
                }
            });
            if !matches!(frozen, Ok(true)) {
                warn!(ride_id = %ride_id, driver_id = %keep.driver_id, "kept driver could not be frozen on repaired ride");
            }
        }
        ride.touch();

        warn!(
            ride_id = %ride_id,
            kept_bid_id = %keep.id,
            rejected = rejected_bid_ids.len(),
            "repaired ride with multiple accepted bids"
        );

        report.details.push(RepairedRide {
            ride_id,
            kept_bid_id: keep.id,
            assigned_driver: ride.assigned_driver.unwrap_or(keep.driver_id),
            rejected_bid_ids,
        });
    }

    report.affected_rides = report.details.len();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::engine::commission::set_commission_percent;
    use crate::engine::lifecycle::{accept_ride_direct, complete_ride};
    use crate::engine::testing::{seed_driver, seed_ride};

    #[test]
    fn bid_on_unknown_ride_is_not_found() {
        let state = AppState::new(16);
        let driver = seed_driver(&state, None);

        assert!(matches!(
            submit_bid(&state, Uuid::new_v4(), driver.id, 900.0, None),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn non_positive_counter_fare_is_invalid() {
        let state = AppState::new(16);
        let ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let driver = seed_driver(&state, None);

        assert!(matches!(
            submit_bid(&state, ride.id, driver.id, 0.0, None),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn duplicate_pending_bid_reports_existing_id() {
        let state = AppState::new(16);
        let ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let driver = seed_driver(&state, None);

        let first = submit_bid(&state, ride.id, driver.id, 900.0, Some("ready".into())).unwrap();
        assert_eq!(first.status, BidStatus::Pending);
        assert_eq!(first.note.as_deref(), Some("ready"));

        match submit_bid(&state, ride.id, driver.id, 950.0, None) {
            Err(AppError::PendingBidExists { bid_id }) => assert_eq!(bid_id, first.id),
            other => panic!("expected PendingBidExists, got {other:?}"),
        }
    }

    #[test]
    fn driver_can_bid_again_after_rejection() {
        let state = AppState::new(16);
        let ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let driver = seed_driver(&state, None);

        let first = submit_bid(&state, ride.id, driver.id, 900.0, None).unwrap();
        reject_bid(&state, ride.id, first.id).unwrap();

        let second = submit_bid(&state, ride.id, driver.id, 950.0, None).unwrap();
        assert_ne!(second.id, first.id);
        assert_eq!(state.store.ride(ride.id).unwrap().status, RideStatus::Pending);
    }

    #[test]
    fn accept_rejects_siblings_and_assigns_driver() {
        let state = AppState::new(16);
        let ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let winner = seed_driver(&state, None);
        let loser = seed_driver(&state, None);

        let winning = submit_bid(&state, ride.id, winner.id, 900.0, None).unwrap();
        let losing = submit_bid(&state, ride.id, loser.id, 850.0, None).unwrap();

        let accepted = accept_bid(&state, ride.id, winning.id).unwrap();
        assert_eq!(accepted.status, RideStatus::Accepted);
        assert_eq!(accepted.assigned_driver, Some(winner.id));
        assert_eq!(accepted.fare_amount, 900.0);
        assert_eq!(accepted.offer_fare, 1000.0);

        let bids = state.store.bids_for_ride(ride.id);
        assert_eq!(
            bids.iter().filter(|b| b.status == BidStatus::Accepted).count(),
            1
        );
        assert!(bids.iter().all(|b| b.status != BidStatus::Pending));
        assert_eq!(state.store.bid(losing.id).unwrap().status, BidStatus::Rejected);
        assert!(state.store.driver(winner.id).unwrap().is_frozen());
        assert!(!state.store.driver(loser.id).unwrap().is_frozen());
    }

    #[test]
    fn rejected_bid_cannot_be_accepted_later() {
        let state = AppState::new(16);
        let ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let driver = seed_driver(&state, None);
        let bid = submit_bid(&state, ride.id, driver.id, 900.0, None).unwrap();
        reject_bid(&state, ride.id, bid.id).unwrap();

        assert!(matches!(
            accept_bid(&state, ride.id, bid.id),
            Err(AppError::InvalidState(_))
        ));
        assert!(!state.store.driver(driver.id).unwrap().is_frozen());
    }

    #[test]
    fn bidding_closes_once_a_bid_is_accepted() {
        let state = AppState::new(16);
        let ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let winner = seed_driver(&state, None);
        let late = seed_driver(&state, None);

        let bid = submit_bid(&state, ride.id, winner.id, 900.0, None).unwrap();
        accept_bid(&state, ride.id, bid.id).unwrap();

        assert!(matches!(
            submit_bid(&state, ride.id, late.id, 800.0, None),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn reaccepting_same_bid_is_noop_but_second_bid_conflicts() {
        let state = AppState::new(16);
        let ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let first_driver = seed_driver(&state, None);
        let second_driver = seed_driver(&state, None);

        let first = submit_bid(&state, ride.id, first_driver.id, 900.0, None).unwrap();
        let second = submit_bid(&state, ride.id, second_driver.id, 880.0, None).unwrap();

        accept_bid(&state, ride.id, first.id).unwrap();
        let again = accept_bid(&state, ride.id, first.id).unwrap();
        assert_eq!(again.assigned_driver, Some(first_driver.id));

        assert!(matches!(
            accept_bid(&state, ride.id, second.id),
            Err(AppError::Conflict(_))
        ));
        assert_eq!(
            state.store.ride(ride.id).unwrap().assigned_driver,
            Some(first_driver.id)
        );
    }

    #[test]
    fn frozen_driver_cannot_win_a_second_ride() {
        let state = AppState::new(16);
        let first_ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let second_ride = seed_ride(&state, 700.0, 31.52, 74.35);
        let driver = seed_driver(&state, None);

        let first = submit_bid(&state, first_ride.id, driver.id, 900.0, None).unwrap();
        let second = submit_bid(&state, second_ride.id, driver.id, 650.0, None).unwrap();
        accept_bid(&state, first_ride.id, first.id).unwrap();

        assert!(matches!(
            accept_bid(&state, second_ride.id, second.id),
            Err(AppError::Conflict(_))
        ));
        let untouched = state.store.ride(second_ride.id).unwrap();
        assert_eq!(untouched.status, RideStatus::Pending);
        assert_eq!(state.store.bid(second.id).unwrap().status, BidStatus::Pending);
    }

    #[test]
    fn reject_validates_ownership_and_acceptance() {
        let state = AppState::new(16);
        let ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let other_ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let driver = seed_driver(&state, None);
        let bid = submit_bid(&state, ride.id, driver.id, 900.0, None).unwrap();

        assert!(matches!(
            reject_bid(&state, other_ride.id, bid.id),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            reject_bid(&state, ride.id, Uuid::new_v4()),
            Err(AppError::NotFound(_))
        ));

        accept_bid(&state, ride.id, bid.id).unwrap();
        assert!(matches!(
            reject_bid(&state, ride.id, bid.id),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn bid_scenario_commission_is_taken_from_accepted_fare() {
        let state = AppState::new(16);
        set_commission_percent(&state, 10.0).unwrap();
        let ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let driver = seed_driver(&state, Some((31.52, 74.35)));

        let bid = submit_bid(&state, ride.id, driver.id, 900.0, None).unwrap();
        accept_bid(&state, ride.id, bid.id).unwrap();
        let completed = complete_ride(&state, ride.id).unwrap();

        assert_eq!(completed.commission_amount, Some(90.0));
        assert!(!state.store.driver(driver.id).unwrap().is_frozen());
    }

    #[test]
    fn direct_accept_withdraws_pending_bids() {
        let state = AppState::new(16);
        let ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let bidder = seed_driver(&state, None);
        let taker = seed_driver(&state, None);
        let bid = submit_bid(&state, ride.id, bidder.id, 900.0, None).unwrap();

        accept_ride_direct(&state, ride.id, taker.id).unwrap();
        assert_eq!(state.store.bid(bid.id).unwrap().status, BidStatus::Rejected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_accepts_leave_exactly_one_winner() {
        let state = Arc::new(AppState::new(64));
        let ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let mut bid_ids = Vec::new();
        for i in 0..8 {
            let driver = seed_driver(&state, None);
            let bid = submit_bid(&state, ride.id, driver.id, 900.0 - i as f64, None).unwrap();
            bid_ids.push(bid.id);
        }

        let handles: Vec<_> = bid_ids
            .iter()
            .map(|bid_id| {
                let state = state.clone();
                let (ride_id, bid_id) = (ride.id, *bid_id);
                tokio::spawn(async move { accept_bid(&state, ride_id, bid_id).is_ok() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        let stored = state.store.ride(ride.id).unwrap();
        let accepted: Vec<_> = state
            .store
            .bids_for_ride(ride.id)
            .into_iter()
            .filter(|b| b.status == BidStatus::Accepted)
            .collect();
        assert_eq!(accepted.len(), 1);
        assert_eq!(stored.assigned_driver, Some(accepted[0].driver_id));
    }

    #[test]
    fn repair_keeps_latest_accepted_bid() {
        let state = AppState::new(16);
        let ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let older_driver = seed_driver(&state, None);
        let newer_driver = seed_driver(&state, None);

        // Corrupt the store the way an unguarded accept path could.
        let now = Utc::now();
        let mut older = Bid::new(ride.id, older_driver.id, 900.0, None);
        older.status = BidStatus::Accepted;
        older.updated_at = now - Duration::seconds(30);
        let mut newer = Bid::new(ride.id, newer_driver.id, 880.0, None);
        newer.status = BidStatus::Accepted;
        newer.updated_at = now;
        state.store.bids.insert(older.id, older.clone());
        state.store.bids.insert(newer.id, newer.clone());
        {
            let mut stored = state.store.lock_ride(ride.id).unwrap();
            stored.status = RideStatus::Accepted;
            stored.assigned_driver = Some(older_driver.id);
        }
        state
            .store
            .update_driver(older_driver.id, |d| {
                d.active_ride = Some(ride.id);
                Ok(())
            })
            .unwrap();

        let report = repair_duplicate_acceptances(&state).unwrap();
        assert_eq!(report.affected_rides, 1);
        assert_eq!(report.details[0].kept_bid_id, newer.id);
        assert_eq!(report.details[0].rejected_bid_ids, vec![older.id]);

        let repaired = state.store.ride(ride.id).unwrap();
        assert_eq!(repaired.assigned_driver, Some(newer_driver.id));
        assert_eq!(repaired.status, RideStatus::Accepted);
        assert_eq!(state.store.bid(older.id).unwrap().status, BidStatus::Rejected);
        assert!(!state.store.driver(older_driver.id).unwrap().is_frozen());
        assert!(state.store.driver(newer_driver.id).unwrap().is_frozen());

        let second_pass = repair_duplicate_acceptances(&state).unwrap();
        assert_eq!(second_pass.affected_rides, 0);
    }

    #[test]
    fn repair_leaves_completed_ride_snapshot_intact() {
        let state = AppState::new(16);
        set_commission_percent(&state, 10.0).unwrap();
        let ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let winner = seed_driver(&state, None);
        let intruder = seed_driver(&state, None);

        let bid = submit_bid(&state, ride.id, winner.id, 900.0, None).unwrap();
        accept_bid(&state, ride.id, bid.id).unwrap();
        let completed = complete_ride(&state, ride.id).unwrap();
        assert_eq!(completed.commission_amount, Some(90.0));

        let mut stray = Bid::new(ride.id, intruder.id, 500.0, None);
        stray.status = BidStatus::Accepted;
        stray.updated_at = Utc::now() + Duration::seconds(60);
        state.store.bids.insert(stray.id, stray.clone());

        let report = repair_duplicate_acceptances(&state).unwrap();
        assert_eq!(report.affected_rides, 1);
        assert_eq!(report.details[0].kept_bid_id, bid.id);
        assert_eq!(report.details[0].assigned_driver, winner.id);
        assert_eq!(report.details[0].rejected_bid_ids, vec![stray.id]);

        let repaired = state.store.ride(ride.id).unwrap();
        assert_eq!(repaired.status, RideStatus::Completed);
        assert_eq!(repaired.assigned_driver, Some(winner.id));
        assert_eq!(repaired.fare_amount, 900.0);
        assert_eq!(repaired.commission_percent, Some(10.0));
        assert_eq!(
            repaired.commission_amount,
            Some(repaired.fare_amount * 10.0 / 100.0)
        );
        assert_eq!(state.store.bid(stray.id).unwrap().status, BidStatus::Rejected);
        assert!(!state.store.driver(winner.id).unwrap().is_frozen());
        assert!(!state.store.driver(intruder.id).unwrap().is_frozen());
    }
}
