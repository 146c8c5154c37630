use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use uuid::Uuid;

use crate::engine::registry::{register_shipper, shipper_notifications, shipper_rides, NewShipper};
use crate::error::AppError;
use crate::models::notification::Notification;
use crate::models::ride::Ride;
use crate::models::shipper::Shipper;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shippers", post(create_shipper))
        .route("/shippers/:id", get(get_shipper))
        .route("/shippers/:id/rides", get(rides))
        .route("/shippers/:id/notifications", get(notifications))
}

async fn create_shipper(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewShipper>,
) -> Result<(StatusCode, Json<Shipper>), AppError> {
    let shipper = register_shipper(&state, payload)?;
    Ok((StatusCode::CREATED, Json(shipper)))
}

async fn get_shipper(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Shipper>, AppError> {
    Ok(Json(state.store.shipper(id)?))
}

async fn rides(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Ride>>, AppError> {
    Ok(Json(shipper_rides(&state, id)?))
}

async fn notifications(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Notification>>, AppError> {
    Ok(Json(shipper_notifications(&state, id)?))
}
