use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::lifecycle::{
    accept_ride_direct, complete_ride, create_ride, driver_location, purge_ride, reject_ride,
    start_ride, update_ride_location, NewRide, RideLocation,
};
use crate::error::AppError;
use crate::models::location::LocationSnapshot;
use crate::models::ride::Ride;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rides", post(create).get(list_rides))
        .route("/rides/:id", get(get_ride).delete(delete_ride))
        .route("/rides/:id/accept", put(accept))
        .route("/rides/:id/start", put(start))
        .route("/rides/:id/complete", put(complete))
        .route("/rides/:id/reject", put(reject))
        .route(
            "/rides/:id/location",
            get(get_location).patch(update_location),
        )
}

#[derive(Deserialize)]
pub struct AcceptRideRequest {
    pub driver_id: Option<Uuid>,
}

/// Lat/lng pair as posted by driver apps. Missing values are a 400, not a
/// body rejection.
#[derive(Deserialize)]
pub struct LocationRequest {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl LocationRequest {
    pub fn coordinates(&self) -> Result<(f64, f64), AppError> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Ok((lat, lng)),
            _ => Err(AppError::InvalidInput(
                "lat and lng are required".to_string(),
            )),
        }
    }
}

async fn create(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewRide>,
) -> Result<(StatusCode, Json<Ride>), AppError> {
    let ride = create_ride(&state, payload)?;
    Ok((StatusCode::CREATED, Json(ride)))
}

async fn list_rides(State(state): State<Arc<AppState>>) -> Json<Vec<Ride>> {
    Json(state.store.rides_where(|_| true))
}

async fn get_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(state.store.ride(id)?))
}

async fn delete_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(purge_ride(&state, id)?))
}

async fn accept(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AcceptRideRequest>,
) -> Result<Json<Ride>, AppError> {
    let driver_id = payload
        .driver_id
        .ok_or_else(|| AppError::InvalidInput("driver_id is required".to_string()))?;

    Ok(Json(accept_ride_direct(&state, id, driver_id)?))
}

async fn start(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(start_ride(&state, id)?))
}

async fn complete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(complete_ride(&state, id)?))
}

async fn reject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(reject_ride(&state, id)?))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LocationRequest>,
) -> Result<Json<LocationSnapshot>, AppError> {
    let (lat, lng) = payload.coordinates()?;
    Ok(Json(update_ride_location(&state, id, lat, lng)?))
}

async fn get_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RideLocation>, AppError> {
    Ok(Json(driver_location(&state, id)?))
}
