use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::bidding::{accept_bid, reject_bid, submit_bid};
use crate::error::AppError;
use crate::models::bid::Bid;
use crate::models::ride::Ride;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rides/:id/bids", post(place_bid).get(list_bids))
        .route("/rides/:id/bids/:bid_id/accept", put(accept))
        .route("/rides/:id/bids/:bid_id/reject", put(reject))
}

#[derive(Deserialize)]
pub struct PlaceBidRequest {
    pub driver_id: Option<Uuid>,
    pub counter_fare: Option<f64>,
    pub note: Option<String>,
}

async fn place_bid(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<Uuid>,
    Json(payload): Json<PlaceBidRequest>,
) -> Result<(StatusCode, Json<Bid>), AppError> {
    let driver_id = payload
        .driver_id
        .ok_or_else(|| AppError::InvalidInput("driver_id is required".to_string()))?;
    let counter_fare = payload
        .counter_fare
        .ok_or_else(|| AppError::InvalidInput("counter_fare is required".to_string()))?;

    let bid = submit_bid(&state, ride_id, driver_id, counter_fare, payload.note)?;
    Ok((StatusCode::CREATED, Json(bid)))
}

async fn list_bids(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Vec<Bid>>, AppError> {
    state.store.ride(ride_id)?;
    Ok(Json(state.store.bids_for_ride(ride_id)))
}

async fn accept(
    State(state): State<Arc<AppState>>,
    Path((ride_id, bid_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(accept_bid(&state, ride_id, bid_id)?))
}

async fn reject(
    State(state): State<Arc<AppState>>,
    Path((ride_id, bid_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Bid>, AppError> {
    Ok(Json(reject_bid(&state, ride_id, bid_id)?))
}
