//! Lobby matching for queued players
//!
//! The decision of where a queued player goes is a pure function of the
//! candidate's rating and a snapshot of the lobbies still filling. The
//! dispatch worker re-checks the decision under the chosen lobby's lock.

use crate::types::{LobbyId, PlayerId, Rating};
use crate::utils::rating_variance;

/// Result of a lobby matching operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchingResult {
    /// Player should be admitted to an existing lobby
    MatchedToLobby(LobbyId),
    /// No lobby accepts the player, a new one should be created
    CreateNewLobby,
}

/// Point-in-time view of a lobby still admitting players
#[derive(Debug, Clone, PartialEq)]
pub struct LobbySnapshot {
    pub lobby_id: LobbyId,
    /// Ratings of the admitted players, in admission order
    pub ratings: Vec<Rating>,
    pub player_ids: Vec<PlayerId>,
    pub capacity: usize,
}

impl LobbySnapshot {
    pub fn is_full(&self) -> bool {
        self.ratings.len() >= self.capacity
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.player_ids.contains(&player_id)
    }
}

/// Whether a lobby whose members have `ratings` admits `candidate`.
///
/// The first player is always admitted. Later candidates are admitted while
/// the rating variance of the members plus the candidate stays within
/// `max_variance`.
pub fn admits(ratings: &[Rating], candidate: Rating, max_variance: f64) -> bool {
    if ratings.is_empty() {
        return true;
    }

    let population: Vec<f64> = ratings
        .iter()
        .chain(std::iter::once(&candidate))
        .map(|&rating| rating as f64)
        .collect();

    rating_variance(&population) <= max_variance
}

/// Trait for lobby matching algorithms
pub trait LobbyMatcher: Send + Sync {
    /// Find the lobby a player with `candidate` rating should join
    fn find_lobby_for_player(&self, candidate: Rating, lobbies: &[LobbySnapshot])
        -> MatchingResult;

    /// Check if a player can join a specific lobby
    fn can_player_join_lobby(&self, candidate: Rating, lobby: &LobbySnapshot) -> bool;
}

/// First-fit matcher gated on rating variance.
///
/// Lobbies are tried in the order given (creation order); the first one
/// that is not full and admits the candidate wins.
#[derive(Debug, Clone)]
pub struct VarianceLobbyMatcher {
    max_variance: f64,
}

impl VarianceLobbyMatcher {
    pub fn new(max_variance: f64) -> Self {
        Self { max_variance }
    }

    pub fn max_variance(&self) -> f64 {
        self.max_variance
    }
}

impl Default for VarianceLobbyMatcher {
    fn default() -> Self {
        Self::new(200.0 * 200.0)
    }
}

impl LobbyMatcher for VarianceLobbyMatcher {
    fn find_lobby_for_player(
        &self,
        candidate: Rating,
        lobbies: &[LobbySnapshot],
    ) -> MatchingResult {
        lobbies
            .iter()
            .find(|lobby| self.can_player_join_lobby(candidate, lobby))
            .map(|lobby| MatchingResult::MatchedToLobby(lobby.lobby_id))
            .unwrap_or(MatchingResult::CreateNewLobby)
    }

    fn can_player_join_lobby(&self, candidate: Rating, lobby: &LobbySnapshot) -> bool {
        !lobby.is_full() && admits(&lobby.ratings, candidate, self.max_variance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::generate_lobby_id;
    use proptest::prelude::*;

    fn snapshot(ratings: &[Rating], capacity: usize) -> LobbySnapshot {
        LobbySnapshot {
            lobby_id: generate_lobby_id(),
            ratings: ratings.to_vec(),
            player_ids: (0..ratings.len() as PlayerId).collect(),
            capacity,
        }
    }

    #[test]
    fn test_first_player_always_admitted() {
        assert!(admits(&[], 0, 40000.0));
        assert!(admits(&[], 3000, 40000.0));
    }

    #[test]
    fn test_two_player_spread_boundary() {
        // d² / 2 <= 40000  <=>  d <= 282.84
        assert!(admits(&[1200], 1482, 40000.0));
        assert!(admits(&[1200], 918, 40000.0));
        assert!(!admits(&[1200], 1483, 40000.0));
        assert!(!admits(&[1200], 917, 40000.0));
    }

    #[test]
    fn test_variance_includes_all_members() {
        // Candidate is close to the last member but widens the whole roster
        assert!(admits(&[1000, 1200], 1200, 40000.0));
        assert!(!admits(&[1000, 1200], 1450, 40000.0));
    }

    #[test]
    fn test_no_lobbies_creates_new() {
        let matcher = VarianceLobbyMatcher::default();
        assert_eq!(
            matcher.find_lobby_for_player(1200, &[]),
            MatchingResult::CreateNewLobby
        );
    }

    #[test]
    fn test_first_fit_in_creation_order() {
        let matcher = VarianceLobbyMatcher::default();
        let far = snapshot(&[2000], 2);
        let first = snapshot(&[1250], 2);
        let second = snapshot(&[1200], 2);

        let result = matcher.find_lobby_for_player(1200, &[far, first.clone(), second]);
        assert_eq!(result, MatchingResult::MatchedToLobby(first.lobby_id));
    }

    #[test]
    fn test_full_lobbies_skipped() {
        let matcher = VarianceLobbyMatcher::default();
        let full = snapshot(&[1200, 1200], 2);
        let open = snapshot(&[1200], 2);

        let result = matcher.find_lobby_for_player(1200, &[full, open.clone()]);
        assert_eq!(result, MatchingResult::MatchedToLobby(open.lobby_id));
    }

    #[test]
    fn test_rejected_everywhere_creates_new() {
        let matcher = VarianceLobbyMatcher::new(40000.0);
        let lobbies = vec![snapshot(&[1000], 2), snapshot(&[2000], 2)];
        assert_eq!(
            matcher.find_lobby_for_player(1500, &lobbies),
            MatchingResult::CreateNewLobby
        );
    }

    proptest! {
        #[test]
        fn prop_close_pairs_always_admitted(base in 0u32..3000, diff in 0u32..=282) {
            prop_assert!(admits(&[base], base + diff, 40000.0));
            prop_assert!(admits(&[base + diff], base, 40000.0));
        }

        #[test]
        fn prop_wide_pairs_always_rejected(base in 0u32..3000, diff in 283u32..2000) {
            prop_assert!(!admits(&[base], base + diff, 40000.0));
        }

        #[test]
        fn prop_rejection_never_picks_rejecting_lobby(
            members in proptest::collection::vec(800u32..2000, 1..4),
            candidate in 0u32..3000,
        ) {
            let matcher = VarianceLobbyMatcher::default();
            let lobby = snapshot(&members, 8);
            let result = matcher.find_lobby_for_player(candidate, std::slice::from_ref(&lobby));
            if admits(&members, candidate, 40000.0) {
                prop_assert_eq!(result, MatchingResult::MatchedToLobby(lobby.lobby_id));
            } else {
                prop_assert_eq!(result, MatchingResult::CreateNewLobby);
            }
        }
    }
}
