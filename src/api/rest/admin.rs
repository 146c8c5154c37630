use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::engine::bidding::{repair_duplicate_acceptances, RepairReport};
use crate::engine::commission::{
    commission_percent, earnings_summary, set_commission_percent, EarningsSummary,
};
use crate::error::AppError;
use crate::models::commission::Commission;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/commission", get(get_commission).put(update_commission))
        .route("/earnings/summary", get(earnings))
        .route("/maintenance/repair-accepted-bids", post(repair))
}

#[derive(Deserialize)]
pub struct UpdateCommissionRequest {
    pub percent: Option<f64>,
}

async fn get_commission(State(state): State<Arc<AppState>>) -> Json<Commission> {
    Json(commission_percent(&state))
}

async fn update_commission(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpdateCommissionRequest>,
) -> Result<Json<Commission>, AppError> {
    let percent = payload
        .percent
        .ok_or_else(|| AppError::InvalidInput("percent is required".to_string()))?;

    Ok(Json(set_commission_percent(&state, percent)?))
}

async fn earnings(State(state): State<Arc<AppState>>) -> Json<EarningsSummary> {
    Json(earnings_summary(&state))
}

async fn repair(State(state): State<Arc<AppState>>) -> Result<Json<RepairReport>, AppError> {
    Ok(Json(repair_duplicate_acceptances(&state)?))
}
