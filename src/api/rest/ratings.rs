use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use uuid::Uuid;

use crate::engine::rating::{ratings_view, submit_rating, NewRating, RatingsView};
use crate::error::AppError;
use crate::models::rating::{Party, PartyKind, Rating};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rides/:id/ratings", post(rate_ride))
        .route("/ratings/:kind/:id", get(ratings_for))
}

async fn rate_ride(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<Uuid>,
    Json(payload): Json<NewRating>,
) -> Result<(StatusCode, Json<Rating>), AppError> {
    let rating = submit_rating(&state, ride_id, payload)?;
    Ok((StatusCode::CREATED, Json(rating)))
}

async fn ratings_for(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<Json<RatingsView>, AppError> {
    let kind: PartyKind = kind.parse()?;
    Ok(Json(ratings_view(&state, Party { kind, id })))
}
