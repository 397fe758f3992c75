//! Matchmaking and lobby configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Number of dispatch workers servicing the matchmaking queue
    pub dispatch_workers: usize,
    /// Number of players in every lobby
    pub lobby_capacity: usize,
    /// Whether completed matches update ratings and records
    pub rated: bool,
    /// Largest rating variance a lobby may reach when admitting a player
    pub max_rating_variance: f64,
    /// Lower bound of the simulated match duration in milliseconds
    pub min_match_duration_ms: u64,
    /// Upper bound of the simulated match duration in milliseconds
    pub max_match_duration_ms: u64,
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            dispatch_workers: 5,
            lobby_capacity: 2,
            rated: true,
            max_rating_variance: 200.0 * 200.0,
            min_match_duration_ms: 2000,
            max_match_duration_ms: 5000,
        }
    }
}

impl MatchmakingSettings {
    /// Settings for tests: no simulated match delay
    pub fn instant() -> Self {
        Self {
            min_match_duration_ms: 0,
            max_match_duration_ms: 0,
            ..Self::default()
        }
    }

    /// Bounds of the simulated match duration
    pub fn match_duration_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.min_match_duration_ms),
            Duration::from_millis(self.max_match_duration_ms),
        )
    }
}
