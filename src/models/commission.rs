use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platform commission singleton.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commission {
    pub percent: f64,
    pub updated_at: DateTime<Utc>,
}

impl Default for Commission {
    fn default() -> Self {
        Self {
            percent: 0.0,
            updated_at: Utc::now(),
        }
    }
}

impl Commission {
    pub fn amount_for(&self, fare: f64) -> f64 {
        fare * self.percent / 100.0
    }
}
