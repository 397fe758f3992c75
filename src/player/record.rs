//! Player record and the shared handle used across tasks

use crate::error::{MatchmakingError, Result};
use crate::types::{PlayerId, PlayerStatus, Rating, RatingClass};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A player's identity, rating and competitive record.
///
/// Serializes to the PROFILE record of the wire protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    #[serde(rename = "USER ID")]
    pub id: PlayerId,
    #[serde(rename = "RANK")]
    pub rank: Option<u32>,
    #[serde(rename = "USERNAME")]
    pub username: String,
    #[serde(rename = "CLASS")]
    pub class: RatingClass,
    #[serde(rename = "RATING")]
    pub rating: Rating,
    #[serde(rename = "GAMES")]
    pub games: u32,
    #[serde(rename = "WINS")]
    pub wins: u32,
    #[serde(rename = "LOSSES")]
    pub losses: u32,
    #[serde(rename = "WIN RATIO")]
    pub win_ratio: f64,
    #[serde(rename = "STATUS")]
    pub status: PlayerStatus,
}

impl Player {
    /// Create a fresh, online player with no games played
    pub fn new(id: PlayerId, username: impl Into<String>, rating: Rating) -> Self {
        Self {
            id,
            rank: None,
            username: username.into(),
            class: RatingClass::from_rating(rating),
            rating,
            games: 0,
            wins: 0,
            losses: 0,
            win_ratio: 0.0,
            status: PlayerStatus::Online,
        }
    }

    /// Replace the rating and re-derive the class
    pub fn set_rating(&mut self, rating: Rating) {
        self.rating = rating;
        self.class = RatingClass::from_rating(rating);
    }

    /// Record a first-place finish
    pub fn record_win(&mut self) {
        self.games += 1;
        self.wins += 1;
        self.win_ratio = self.wins as f64 / self.games as f64;
    }

    /// Record any finish other than first place.
    ///
    /// The ratio is stored as a percentage here but as a fraction in
    /// [`Player::record_win`]; clients rely on the current values.
    pub fn record_loss(&mut self) {
        self.games += 1;
        self.losses += 1;
        self.win_ratio = self.wins as f64 / self.games as f64 * 100.0;
    }
}

/// Shared, lock-protected reference to a [`Player`].
///
/// The id and username never change, so they are readable without locking.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    id: PlayerId,
    username: Arc<str>,
    inner: Arc<RwLock<Player>>,
}

impl PlayerHandle {
    pub fn new(player: Player) -> Self {
        Self {
            id: player.id,
            username: Arc::from(player.username.as_str()),
            inner: Arc::new(RwLock::new(player)),
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Acquire the record for reading
    pub fn read(&self) -> Result<RwLockReadGuard<'_, Player>> {
        self.inner
            .read()
            .map_err(|_| MatchmakingError::poisoned("player").into())
    }

    /// Acquire the record for writing
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, Player>> {
        self.inner
            .write()
            .map_err(|_| MatchmakingError::poisoned("player").into())
    }

    /// Copy of the current record
    pub fn snapshot(&self) -> Result<Player> {
        Ok(self.read()?.clone())
    }

    pub fn rating(&self) -> Result<Rating> {
        Ok(self.read()?.rating)
    }

    pub fn status(&self) -> Result<PlayerStatus> {
        Ok(self.read()?.status)
    }

    pub fn set_status(&self, status: PlayerStatus) -> Result<()> {
        self.write()?.status = status;
        Ok(())
    }

    /// Set the status to `to` only if it is currently `from`.
    ///
    /// Returns whether the status changed.
    pub fn transition_status(&self, from: PlayerStatus, to: PlayerStatus) -> Result<bool> {
        let mut player = self.write()?;
        if player.status != from {
            return Ok(false);
        }
        player.status = to;
        Ok(true)
    }

    /// Whether both handles refer to the same record
    pub fn same_player(&self, other: &PlayerHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_player_defaults() {
        let player = Player::new(0, "alice", 1200);
        assert_eq!(player.rating, 1200);
        assert_eq!(player.class, RatingClass::D);
        assert_eq!(player.rank, None);
        assert_eq!(player.games, 0);
        assert_eq!(player.status, PlayerStatus::Online);
    }

    #[test]
    fn test_set_rating_updates_class() {
        let mut player = Player::new(0, "alice", 1200);
        player.set_rating(1199);
        assert_eq!(player.class, RatingClass::E);
        player.set_rating(2400);
        assert_eq!(player.class, RatingClass::SSS);
    }

    #[test]
    fn test_win_ratio_scales_differ_between_win_and_loss() {
        let mut winner = Player::new(0, "winner", 1200);
        winner.record_win();
        assert_eq!(winner.games, 1);
        assert_eq!(winner.wins, 1);
        assert_eq!(winner.win_ratio, 1.0);

        let mut loser = Player::new(1, "loser", 1200);
        loser.record_win();
        loser.record_loss();
        assert_eq!(loser.games, 2);
        assert_eq!(loser.losses, 1);
        // Fraction after a win, percentage after a loss
        assert_eq!(loser.win_ratio, 50.0);
    }

    #[test]
    fn test_profile_wire_keys() {
        let player = Player::new(7, "bob", 1450);
        let value = serde_json::to_value(&player).unwrap();
        assert_eq!(value["USER ID"], 7);
        assert_eq!(value["USERNAME"], "bob");
        assert_eq!(value["CLASS"], "C");
        assert_eq!(value["RATING"], 1450);
        assert_eq!(value["WIN RATIO"], 0.0);
        assert_eq!(value["STATUS"], "ONLINE");
        assert!(value["RANK"].is_null());
    }

    #[test]
    fn test_handle_shares_record() {
        let handle = PlayerHandle::new(Player::new(3, "carol", 1300));
        let clone = handle.clone();
        clone.set_status(PlayerStatus::InQueue).unwrap();
        assert_eq!(handle.status().unwrap(), PlayerStatus::InQueue);
        assert!(handle.same_player(&clone));
        assert_eq!(handle.username(), "carol");
        assert_eq!(handle.id(), 3);
    }

    #[test]
    fn test_transition_status_requires_expected_state() {
        let handle = PlayerHandle::new(Player::new(4, "dave", 1200));
        handle.set_status(PlayerStatus::Offline).unwrap();

        assert!(!handle
            .transition_status(PlayerStatus::InGame, PlayerStatus::Online)
            .unwrap());
        assert_eq!(handle.status().unwrap(), PlayerStatus::Offline);

        handle.set_status(PlayerStatus::InGame).unwrap();
        assert!(handle
            .transition_status(PlayerStatus::InGame, PlayerStatus::Online)
            .unwrap());
        assert_eq!(handle.status().unwrap(), PlayerStatus::Online);
    }
}
