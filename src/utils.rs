//! Utility functions for the matchmaking server

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique lobby ID
pub fn generate_lobby_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique match ID
pub fn generate_match_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Spread of a set of ratings around their mean.
///
/// The sum of squared deviations is divided by `n - 1`, so two ratings
/// `d` points apart have a variance of `d² / 2`. Fewer than two ratings
/// have no spread.
pub fn rating_variance(ratings: &[f64]) -> f64 {
    if ratings.len() < 2 {
        return 0.0;
    }

    let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
    ratings.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (ratings.len() - 1) as f64
}

/// Round a value to two decimal places for display
pub fn round_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
