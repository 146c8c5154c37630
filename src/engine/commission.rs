use serde::Serialize;
use tracing::info;

use crate::error::AppError;
use crate::models::commission::Commission;
use crate::models::ride::RideStatus;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct EarningsSummary {
    pub completed_rides: usize,
    pub total_fare: f64,
    pub total_commission: f64,
    pub current_percent: f64,
}

pub fn commission_percent(state: &AppState) -> Commission {
    state.store.commission()
}

/// Changes the platform rate. Rides already completed keep their snapshot.
pub fn set_commission_percent(state: &AppState, percent: f64) -> Result<Commission, AppError> {
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(AppError::InvalidInput(
            "percent must be between 0 and 100".to_string(),
        ));
    }

    let commission = state.store.set_commission_percent(percent);
    info!(percent, "commission percent updated");
    Ok(commission)
}

pub fn earnings_summary(state: &AppState) -> EarningsSummary {
    let completed = state
        .store
        .rides_where(|ride| ride.status == RideStatus::Completed);

    EarningsSummary {
        completed_rides: completed.len(),
        total_fare: completed.iter().map(|ride| ride.fare_amount).sum(),
        total_commission: completed
            .iter()
            .filter_map(|ride| ride.commission_amount)
            .sum(),
        current_percent: state.store.commission().percent,
    }
}
