use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PartyKind {
    Driver,
    User,
}

impl fmt::Display for PartyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartyKind::Driver => f.write_str("Driver"),
            PartyKind::User => f.write_str("User"),
        }
    }
}

impl FromStr for PartyKind {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "driver" => Ok(PartyKind::Driver),
            "user" | "shipper" => Ok(PartyKind::User),
            other => Err(AppError::InvalidInput(format!(
                "unknown party kind: {other}, expected Driver/User"
            ))),
        }
    }
}

/// Either side of a rating: a driver or a user (shipper).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Party {
    pub kind: PartyKind,
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct Rating {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub rater: Party,
    pub ratee: Party,
    pub stars: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub count: usize,
}
