//! Rating system configuration

use crate::types::Rating;
use serde::{Deserialize, Serialize};

/// Elo parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingSettings {
    /// Rating given to every new account
    pub initial_rating: Rating,
    /// Maximum rating change per unit of placement error
    pub k_factor: f64,
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            initial_rating: 1200,
            k_factor: 32.0,
        }
    }
}
