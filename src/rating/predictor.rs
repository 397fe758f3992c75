//! Outcome prediction for a fixed roster
//!
//! Every pairwise result is modelled as an independent Bernoulli trial with
//! the Elo win probability. A player's chance of finishing in place `r` is
//! the total probability of winning exactly `N - r` of their `N - 1`
//! pairings, summed over every subset of opponents they could beat. The
//! per-player distributions are not a consistent joint ranking of the whole
//! lobby; each one is only guaranteed to sum to 1.

use crate::error::{MatchmakingError, Result};
use crate::rating::elo::{expected_placement, win_probability};
use crate::types::{PlayerId, Rating};
use std::collections::HashMap;

/// Largest roster the predictor accepts (subset enumeration is exponential)
pub const MAX_ROSTER_SIZE: usize = 16;

/// Tolerance on the sum of a placement distribution
pub const PLACEMENT_SUM_TOLERANCE: f64 = 1e-9;

/// Win probability of every player against every other roster member
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OddsTable {
    odds: HashMap<PlayerId, HashMap<PlayerId, f64>>,
}

impl OddsTable {
    /// Probability that `player` beats `opponent`
    pub fn get(&self, player: PlayerId, opponent: PlayerId) -> Option<f64> {
        self.odds
            .get(&player)
            .and_then(|row| row.get(&opponent))
            .copied()
    }

    fn insert_pair(&mut self, player: PlayerId, opponent: PlayerId, probability: f64) {
        self.odds
            .entry(player)
            .or_default()
            .insert(opponent, probability);
        // Complement rather than a second evaluation, so each pair sums to 1
        self.odds
            .entry(opponent)
            .or_default()
            .insert(player, 1.0 - probability);
    }

    /// Number of players with at least one entry
    pub fn len(&self) -> usize {
        self.odds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.odds.is_empty()
    }
}

/// `P(place = 1) .. P(place = N)` for every roster member
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementTable {
    placements: HashMap<PlayerId, Vec<f64>>,
}

impl PlacementTable {
    /// Placement distribution of a player, first place first
    pub fn get(&self, player: PlayerId) -> Option<&[f64]> {
        self.placements.get(&player).map(Vec::as_slice)
    }

    /// Expected final placement of a player
    pub fn expected_placement(&self, player: PlayerId) -> Option<f64> {
        self.get(player).map(expected_placement)
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

/// Odds and placement tables computed once for a full lobby
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prediction {
    pub odds: OddsTable,
    pub placements: PlacementTable,
}

/// Computes pairwise odds and placement distributions
#[derive(Debug, Clone, Copy, Default)]
pub struct OutcomePredictor;

impl OutcomePredictor {
    pub fn new() -> Self {
        Self
    }

    /// Predict the outcome of a match between `roster` members.
    ///
    /// Fails with [`MatchmakingError::InvariantViolation`] if the roster is
    /// malformed or a placement distribution does not sum to 1.
    pub fn predict(&self, roster: &[(PlayerId, Rating)]) -> Result<Prediction> {
        if roster.len() > MAX_ROSTER_SIZE {
            return Err(MatchmakingError::InvariantViolation {
                message: format!(
                    "Roster of {} exceeds the predictor limit of {}",
                    roster.len(),
                    MAX_ROSTER_SIZE
                ),
            }
            .into());
        }

        let odds = self.pairwise_odds(roster)?;

        let mut placements = PlacementTable::default();
        for &(player_id, _) in roster {
            let opponents: Vec<PlayerId> = roster
                .iter()
                .map(|&(id, _)| id)
                .filter(|&id| id != player_id)
                .collect();
            let distribution = self.placement_distribution(player_id, &opponents, &odds)?;
            placements.placements.insert(player_id, distribution);
        }

        Ok(Prediction { odds, placements })
    }

    /// Build the odds table for every unordered pair of the roster
    pub fn pairwise_odds(&self, roster: &[(PlayerId, Rating)]) -> Result<OddsTable> {
        let mut odds = OddsTable::default();
        for (i, &(player_id, player_rating)) in roster.iter().enumerate() {
            odds.odds.entry(player_id).or_default();
            for &(opponent_id, opponent_rating) in &roster[i + 1..] {
                if opponent_id == player_id {
                    return Err(MatchmakingError::InvariantViolation {
                        message: format!("Player {} appears twice in the roster", player_id),
                    }
                    .into());
                }
                odds.insert_pair(
                    player_id,
                    opponent_id,
                    win_probability(player_rating, opponent_rating),
                );
            }
        }
        Ok(odds)
    }

    /// Placement distribution of `player_id` against `opponents`.
    ///
    /// Each bit mask over the opponents is one way the pairings can fall:
    /// set bits are beaten opponents. A mask with `w` wins contributes to
    /// place `opponents.len() - w + 1`.
    pub fn placement_distribution(
        &self,
        player_id: PlayerId,
        opponents: &[PlayerId],
        odds: &OddsTable,
    ) -> Result<Vec<f64>> {
        let missing = |opponent: PlayerId| MatchmakingError::InvariantViolation {
            message: format!("No odds for {} against {}", player_id, opponent),
        };

        let win_odds = opponents
            .iter()
            .map(|&opponent| odds.get(player_id, opponent).ok_or_else(|| missing(opponent)))
            .collect::<std::result::Result<Vec<f64>, _>>()?;

        let others = opponents.len();
        let mut distribution = vec![0.0; others + 1];

        for mask in 0u32..(1u32 << others) {
            let mut probability = 1.0;
            for (bit, win) in win_odds.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    probability *= win;
                } else {
                    probability *= 1.0 - win;
                }
            }
            let wins = mask.count_ones() as usize;
            distribution[others - wins] += probability;
        }

        let total: f64 = distribution.iter().sum();
        if (total - 1.0).abs() > PLACEMENT_SUM_TOLERANCE {
            return Err(MatchmakingError::InvariantViolation {
                message: format!(
                    "Placement probabilities of player {} sum to {}",
                    player_id, total
                ),
            }
            .into());
        }

        Ok(distribution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_two_equal_players() {
        let prediction = OutcomePredictor::new()
            .predict(&[(1, 1200), (2, 1200)])
            .unwrap();

        assert_eq!(prediction.odds.get(1, 2), Some(0.5));
        assert_eq!(prediction.odds.get(2, 1), Some(0.5));

        let placements = prediction.placements.get(1).unwrap();
        assert_eq!(placements.len(), 2);
        assert!((placements[0] - 0.5).abs() < 1e-12);
        assert!((placements[1] - 0.5).abs() < 1e-12);
        assert!((prediction.placements.expected_placement(2).unwrap() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_two_player_placements_follow_odds() {
        let prediction = OutcomePredictor::new()
            .predict(&[(1, 1600), (2, 1200)])
            .unwrap();

        let p = prediction.odds.get(1, 2).unwrap();
        let strong = prediction.placements.get(1).unwrap();
        let weak = prediction.placements.get(2).unwrap();
        assert!((strong[0] - p).abs() < 1e-12);
        assert!((weak[0] - (1.0 - p)).abs() < 1e-12);
    }

    #[test]
    fn test_three_player_distribution() {
        let prediction = OutcomePredictor::new()
            .predict(&[(1, 1400), (2, 1200), (3, 1300)])
            .unwrap();

        let p12 = prediction.odds.get(1, 2).unwrap();
        let p13 = prediction.odds.get(1, 3).unwrap();
        let placements = prediction.placements.get(1).unwrap();

        assert_eq!(placements.len(), 3);
        assert!((placements[0] - p12 * p13).abs() < 1e-12);
        assert!((placements[1] - (p12 * (1.0 - p13) + (1.0 - p12) * p13)).abs() < 1e-12);
        assert!((placements[2] - (1.0 - p12) * (1.0 - p13)).abs() < 1e-12);
    }

    #[test]
    fn test_duplicate_player_rejected() {
        let result = OutcomePredictor::new().predict(&[(1, 1200), (1, 1300)]);
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn test_missing_odds_rejected() {
        let predictor = OutcomePredictor::new();
        let odds = predictor.pairwise_odds(&[(1, 1200), (2, 1200)]).unwrap();
        assert!(predictor.placement_distribution(1, &[2, 3], &odds).is_err());
    }

    #[test]
    fn test_oversized_roster_rejected() {
        let roster: Vec<_> = (0..(MAX_ROSTER_SIZE as u64 + 1))
            .map(|id| (id, 1200))
            .collect();
        assert!(OutcomePredictor::new().predict(&roster).is_err());
    }

    proptest! {
        #[test]
        fn prop_pairwise_odds_are_complementary(a in 0u32..3000, b in 0u32..3000) {
            let odds = OutcomePredictor::new().pairwise_odds(&[(1, a), (2, b)]).unwrap();
            let forward = odds.get(1, 2).unwrap();
            let backward = odds.get(2, 1).unwrap();
            prop_assert!((forward + backward - 1.0).abs() < 1e-12);
        }

        #[test]
        fn prop_placements_sum_to_one(ratings in proptest::collection::vec(0u32..3000, 2..8)) {
            let roster: Vec<(PlayerId, Rating)> = ratings
                .iter()
                .enumerate()
                .map(|(i, &r)| (i as PlayerId, r))
                .collect();
            let prediction = OutcomePredictor::new().predict(&roster).unwrap();

            for &(id, _) in &roster {
                let placements = prediction.placements.get(id).unwrap();
                prop_assert_eq!(placements.len(), roster.len());
                let total: f64 = placements.iter().sum();
                prop_assert!((total - 1.0).abs() <= 1e-9);
            }
        }
    }
}
