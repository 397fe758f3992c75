//! Global rating-ordered leaderboard
//!
//! Players enter the leaderboard after their first completed rated match.
//! Every refresh re-sorts the whole board by rating and reassigns ranks, so
//! ranks are always `1..=len` in rating-descending order.

use crate::error::{MatchmakingError, Result};
use crate::player::PlayerHandle;
use crate::protocol::PlayerSummary;
use crate::types::Rating;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Default)]
pub struct Leaderboard {
    entries: Mutex<Vec<PlayerHandle>>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<PlayerHandle>>> {
        self.entries
            .lock()
            .map_err(|_| MatchmakingError::poisoned("leaderboard").into())
    }

    /// Add unranked `players`, re-sort and re-rank the whole board.
    ///
    /// The lock is held for the complete cycle.
    pub fn refresh(&self, players: &[PlayerHandle]) -> Result<()> {
        let mut entries = self.lock()?;

        for player in players {
            let unranked = player.read()?.rank.is_none();
            if unranked && !entries.iter().any(|entry| entry.same_player(player)) {
                debug!("Player '{}' enters the leaderboard", player.username());
                entries.push(player.clone());
            }
        }

        let ratings = entries
            .iter()
            .map(PlayerHandle::rating)
            .collect::<Result<Vec<Rating>>>()?;
        let mut order: Vec<usize> = (0..entries.len()).collect();
        // Stable, so tied players keep their previous relative order
        order.sort_by(|&a, &b| ratings[b].cmp(&ratings[a]));

        let sorted: Vec<PlayerHandle> = order.iter().map(|&i| entries[i].clone()).collect();
        for (position, player) in sorted.iter().enumerate() {
            player.write()?.rank = Some(position as u32 + 1);
        }
        *entries = sorted;

        debug!("Leaderboard refreshed with {} entries", entries.len());
        Ok(())
    }

    /// Consistent copy of the board in rank order
    pub fn snapshot(&self) -> Result<Vec<PlayerSummary>> {
        let entries = self.lock()?;
        entries
            .iter()
            .map(|player| -> Result<PlayerSummary> {
                Ok(PlayerSummary::from_player(&*player.read()?))
            })
            .collect()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Player;
    use proptest::prelude::*;

    fn player(id: u64, rating: Rating) -> PlayerHandle {
        PlayerHandle::new(Player::new(id, format!("player{}", id), rating))
    }

    #[test]
    fn test_refresh_ranks_by_rating() {
        let leaderboard = Leaderboard::new();
        let low = player(0, 1100);
        let high = player(1, 1500);
        let mid = player(2, 1300);

        leaderboard
            .refresh(&[low.clone(), high.clone(), mid.clone()])
            .unwrap();

        assert_eq!(high.read().unwrap().rank, Some(1));
        assert_eq!(mid.read().unwrap().rank, Some(2));
        assert_eq!(low.read().unwrap().rank, Some(3));

        let snapshot = leaderboard.snapshot().unwrap();
        let names: Vec<_> = snapshot.iter().map(|s| s.username.as_str()).collect();
        assert_eq!(names, vec!["player1", "player2", "player0"]);
    }

    #[test]
    fn test_refresh_reorders_existing_entries() {
        let leaderboard = Leaderboard::new();
        let a = player(0, 1200);
        let b = player(1, 1300);
        leaderboard.refresh(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(a.read().unwrap().rank, Some(2));

        a.write().unwrap().set_rating(1400);
        leaderboard.refresh(&[a.clone()]).unwrap();

        assert_eq!(leaderboard.len().unwrap(), 2);
        assert_eq!(a.read().unwrap().rank, Some(1));
        assert_eq!(b.read().unwrap().rank, Some(2));
    }

    #[test]
    fn test_refresh_ignores_duplicates() {
        let leaderboard = Leaderboard::new();
        let a = player(0, 1200);
        leaderboard.refresh(&[a.clone(), a.clone()]).unwrap();
        leaderboard.refresh(&[a.clone()]).unwrap();
        assert_eq!(leaderboard.len().unwrap(), 1);
    }

    #[test]
    fn test_empty_leaderboard() {
        let leaderboard = Leaderboard::new();
        assert!(leaderboard.is_empty().unwrap());
        assert!(leaderboard.snapshot().unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_ranks_contiguous_and_sorted(
            batches in proptest::collection::vec(
                proptest::collection::vec(0u32..3000, 1..5),
                1..6,
            )
        ) {
            let leaderboard = Leaderboard::new();
            let mut next_id = 0;
            let mut all: Vec<PlayerHandle> = Vec::new();
            for batch in batches {
                let mut handles = Vec::new();
                for rating in batch {
                    let handle = player(next_id, rating);
                    next_id += 1;
                    handles.push(handle);
                }
                // Re-submitting earlier players must not duplicate them
                handles.extend(all.iter().take(1).cloned());
                leaderboard.refresh(&handles).unwrap();
                all.extend(handles);
            }

            let snapshot = leaderboard.snapshot().unwrap();
            prop_assert_eq!(snapshot.len() as u64, next_id);
            for (i, entry) in snapshot.iter().enumerate() {
                prop_assert_eq!(entry.rank, Some(i as u32 + 1));
            }
            for pair in snapshot.windows(2) {
                prop_assert!(pair[0].rating >= pair[1].rating);
            }
        }
    }
}
