use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::rides::LocationRequest;
use crate::engine::lifecycle::update_driver_location;
use crate::engine::matching::{available_rides, AvailableRides};
use crate::engine::registry::{
    completed_rides, current_ride, driver_details, list_drivers, register_driver,
    set_driver_online, vehicle_stats, DriverDetails, NewDriver, VehicleStats,
};
use crate::error::AppError;
use crate::models::driver::DriverProfile;
use crate::models::location::LocationSnapshot;
use crate::models::ride::Ride;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(all_drivers))
        .route("/drivers/:id", get(get_driver))
        .route("/drivers/:id/status", put(update_status))
        .route("/drivers/:id/location", patch(update_location))
        .route("/drivers/:id/available-rides", get(offers))
        .route("/drivers/:id/rides/current", get(current))
        .route("/drivers/:id/rides/completed", get(completed))
        .route("/vehicles/stats", get(stats))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub online: bool,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewDriver>,
) -> Result<(StatusCode, Json<DriverProfile>), AppError> {
    let driver = register_driver(&state, payload)?;
    Ok((StatusCode::CREATED, Json(driver)))
}

async fn all_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<DriverProfile>> {
    Json(list_drivers(&state))
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverDetails>, AppError> {
    Ok(Json(driver_details(&state, id)?))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<DriverProfile>, AppError> {
    Ok(Json(set_driver_online(&state, id, payload.online)?))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LocationRequest>,
) -> Result<Json<LocationSnapshot>, AppError> {
    let (lat, lng) = payload.coordinates()?;
    Ok(Json(update_driver_location(&state, id, lat, lng)?))
}

async fn offers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AvailableRides>, AppError> {
    Ok(Json(available_rides(&state, id)?))
}

async fn current(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<Ride>>, AppError> {
    Ok(Json(current_ride(&state, id)?))
}

async fn completed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Ride>>, AppError> {
    Ok(Json(completed_rides(&state, id)?))
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<VehicleStats> {
    Json(vehicle_stats(&state))
}
