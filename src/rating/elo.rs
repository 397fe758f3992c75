//! Pairwise Elo win probability

use crate::types::Rating;
use skillratings::elo::{expected_score, EloRating};

/// Probability that a player rated `player` beats one rated `opponent`.
///
/// `10^(Ri/400) / (10^(Ri/400) + 10^(Rj/400))`, the logistic Elo curve.
pub fn win_probability(player: Rating, opponent: Rating) -> f64 {
    let (player_expected, _) = expected_score(
        &EloRating {
            rating: player as f64,
        },
        &EloRating {
            rating: opponent as f64,
        },
    );
    player_expected
}

/// Weighted average placement `Σ (k+1)·P(place = k+1)` of a placement
/// distribution indexed from first place.
pub fn expected_placement(placements: &[f64]) -> f64 {
    placements
        .iter()
        .enumerate()
        .map(|(k, p)| (k + 1) as f64 * p)
        .sum()
}
