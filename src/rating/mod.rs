//! Elo-based outcome prediction and rating updates
//!
//! This module provides the pairwise win probabilities, the placement
//! distribution of a lobby, and the rating adjustment applied after a
//! rated match.

pub mod calculator;
pub mod elo;
pub mod predictor;

// Re-export commonly used types
pub use calculator::{EloPlacementCalculator, RatingCalculator, Standing};
pub use elo::{expected_placement, win_probability};
pub use predictor::{OddsTable, OutcomePredictor, PlacementTable, Prediction};
