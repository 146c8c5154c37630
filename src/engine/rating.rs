use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::rating::{Party, PartyKind, Rating, RatingSummary};
use crate::models::ride::RideStatus;
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewRating {
    pub rater_id: Option<Uuid>,
    pub rater_kind: Option<String>,
    pub ratee_id: Option<Uuid>,
    pub ratee_kind: Option<String>,
    /// Kept as raw JSON so a non-integer value is a validation error.
    pub stars: Option<Value>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingsView {
    #[serde(flatten)]
    pub summary: RatingSummary,
    pub ratings: Vec<Rating>,
}

fn party(id: Option<Uuid>, kind: Option<String>, role: &str) -> Result<Party, AppError> {
    let id = id.ok_or_else(|| AppError::InvalidInput(format!("{role}_id is required")))?;
    let kind: PartyKind = kind
        .ok_or_else(|| AppError::InvalidInput(format!("{role}_kind is required")))?
        .parse()?;
    Ok(Party { kind, id })
}

pub fn submit_rating(
    state: &AppState,
    ride_id: Uuid,
    input: NewRating,
) -> Result<Rating, AppError> {
    let stars = match input.stars {
        Some(raw) => match raw.as_i64() {
            Some(stars @ 1..=5) => stars as u8,
            _ => {
                return Err(AppError::InvalidInput(format!(
                    "stars must be an integer between 1 and 5, got {raw}"
                )));
            }
        },
        None => return Err(AppError::InvalidInput("stars is required".to_string())),
    };
    let rater = party(input.rater_id, input.rater_kind, "rater")?;
    let ratee = party(input.ratee_id, input.ratee_kind, "ratee")?;

    let ride = state.store.ride(ride_id)?;
    if ride.status != RideStatus::Completed {
        return Err(AppError::InvalidState(format!(
            "ride {ride_id} is {:?}; only completed rides can be rated",
            ride.status
        )));
    }

    let rating = state.store.insert_rating(Rating {
        id: Uuid::new_v4(),
        ride_id,
        rater,
        ratee,
        stars,
        comment: input
            .comment
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()),
        created_at: Utc::now(),
    });

    info!(ride_id = %ride_id, ratee_kind = %ratee.kind, ratee_id = %ratee.id, stars, "rating submitted");
    Ok(rating)
}

/// Mean stars received by `ratee`, rounded to one decimal. `(0, 0)` when unrated.
pub fn average_rating(state: &AppState, ratee: Party) -> RatingSummary {
    summarize(&state.store.ratings_for(ratee))
}

pub fn ratings_view(state: &AppState, ratee: Party) -> RatingsView {
    let ratings = state.store.ratings_for(ratee);
    RatingsView {
        summary: summarize(&ratings),
        ratings,
    }
}

fn summarize(ratings: &[Rating]) -> RatingSummary {
    if ratings.is_empty() {
        return RatingSummary {
            average: 0.0,
            count: 0,
        };
    }

    let total: u32 = ratings.iter().map(|rating| u32::from(rating.stars)).sum();
    let mean = f64::from(total) / ratings.len() as f64;

    RatingSummary {
        average: (mean * 10.0).round() / 10.0,
        count: ratings.len(),
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::engine::lifecycle::{accept_ride_direct, complete_ride};
    use crate::engine::testing::{seed_driver, seed_ride};

    fn shipper_rates_driver(shipper: Uuid, driver: Uuid, stars: i64) -> NewRating {
        NewRating {
            rater_id: Some(shipper),
            rater_kind: Some("User".to_string()),
            ratee_id: Some(driver),
            ratee_kind: Some("Driver".to_string()),
            stars: Some(stars.into()),
            comment: None,
        }
    }

    #[test]
    fn pending_ride_cannot_be_rated() {
        let state = AppState::new(16);
        let ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let driver = seed_driver(&state, None);

        assert!(matches!(
            submit_rating(&state, ride.id, shipper_rates_driver(ride.shipper_id, driver.id, 4)),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn input_is_validated_before_ride_lookup() {
        let state = AppState::new(16);
        let missing_ride = Uuid::new_v4();

        assert!(matches!(
            submit_rating(&state, missing_ride, shipper_rates_driver(Uuid::new_v4(), Uuid::new_v4(), 6)),
            Err(AppError::InvalidInput(_))
        ));
        let mut fractional = shipper_rates_driver(Uuid::new_v4(), Uuid::new_v4(), 3);
        fractional.stars = Some(serde_json::json!(4.5));
        assert!(matches!(
            submit_rating(&state, missing_ride, fractional),
            Err(AppError::InvalidInput(_))
        ));
        let mut worded = shipper_rates_driver(Uuid::new_v4(), Uuid::new_v4(), 3);
        worded.stars = Some(serde_json::json!("five"));
        assert!(matches!(
            submit_rating(&state, missing_ride, worded),
            Err(AppError::InvalidInput(_))
        ));
        let mut no_kind = shipper_rates_driver(Uuid::new_v4(), Uuid::new_v4(), 3);
        no_kind.ratee_kind = None;
        assert!(matches!(
            submit_rating(&state, missing_ride, no_kind),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            submit_rating(&state, missing_ride, shipper_rates_driver(Uuid::new_v4(), Uuid::new_v4(), 3)),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn average_starts_at_zero_and_tracks_ratings() {
        let state = AppState::new(16);
        let ride = seed_ride(&state, 1000.0, 31.52, 74.35);
        let driver = seed_driver(&state, None);
        let subject = Party {
            kind: PartyKind::Driver,
            id: driver.id,
        };

        assert_eq!(
            average_rating(&state, subject),
            RatingSummary {
                average: 0.0,
                count: 0
            }
        );

        accept_ride_direct(&state, ride.id, driver.id).unwrap();
        complete_ride(&state, ride.id).unwrap();
        submit_rating(&state, ride.id, shipper_rates_driver(ride.shipper_id, driver.id, 4)).unwrap();

        assert_eq!(
            average_rating(&state, subject),
            RatingSummary {
                average: 4.0,
                count: 1
            }
        );

        submit_rating(&state, ride.id, shipper_rates_driver(ride.shipper_id, driver.id, 5)).unwrap();
        submit_rating(&state, ride.id, shipper_rates_driver(ride.shipper_id, driver.id, 5)).unwrap();
        let summary = average_rating(&state, subject);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average, 4.7);

        // Same id under the other kind is a different subject.
        let as_user = Party {
            kind: PartyKind::User,
            id: driver.id,
        };
        assert_eq!(average_rating(&state, as_user).count, 0);
    }
}
