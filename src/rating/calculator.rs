//! Rating calculator trait and the placement-based Elo implementation
//!
//! After a rated match every player moves by `K × (expected − actual)`
//! where both terms are placements (1 = first), so finishing better than
//! predicted raises the rating.

use crate::error::{MatchmakingError, Result};
use crate::types::{PlayerId, Rating, RatingChange};
use serde::{Deserialize, Serialize};

/// A player's predicted and actual result in a finished match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub player_id: PlayerId,
    pub rating: Rating,
    /// Expected placement from the pre-match prediction
    pub expected_score: f64,
    /// Final placement, 1 = first place
    pub rank: u32,
}

/// Trait for calculating rating changes after games
pub trait RatingCalculator: Send + Sync {
    /// Calculate the new rating of every player in a finished match
    fn calculate_rating_changes(&self, standings: &[Standing]) -> Result<Vec<RatingChange>>;

    /// Get the initial rating for new players
    fn initial_rating(&self) -> Rating;
}

/// Elo adjustment against the expected placement
#[derive(Debug, Clone)]
pub struct EloPlacementCalculator {
    k_factor: f64,
    initial_rating: Rating,
}

impl EloPlacementCalculator {
    pub fn new(k_factor: f64, initial_rating: Rating) -> Result<Self> {
        if k_factor <= 0.0 {
            return Err(MatchmakingError::ConfigurationError {
                message: "K factor must be positive".to_string(),
            }
            .into());
        }

        Ok(Self {
            k_factor,
            initial_rating,
        })
    }

    /// `max(0, round(rating + K × (expected − rank)))`
    pub fn adjusted_rating(&self, rating: Rating, expected_score: f64, rank: u32) -> Rating {
        let adjusted = rating as f64 + self.k_factor * (expected_score - rank as f64);
        adjusted.round().max(0.0) as Rating
    }
}

impl Default for EloPlacementCalculator {
    fn default() -> Self {
        Self {
            k_factor: 32.0,
            initial_rating: 1200,
        }
    }
}

impl RatingCalculator for EloPlacementCalculator {
    fn calculate_rating_changes(&self, standings: &[Standing]) -> Result<Vec<RatingChange>> {
        if standings.is_empty() {
            return Err(MatchmakingError::InternalError {
                message: "No standings provided for rating calculation".to_string(),
            }
            .into());
        }

        Ok(standings
            .iter()
            .map(|standing| RatingChange {
                player_id: standing.player_id,
                old_rating: standing.rating,
                new_rating: self.adjusted_rating(
                    standing.rating,
                    standing.expected_score,
                    standing.rank,
                ),
                rank: standing.rank,
                expected_score: standing.expected_score,
            })
            .collect())
    }

    fn initial_rating(&self) -> Rating {
        self.initial_rating
    }
}
