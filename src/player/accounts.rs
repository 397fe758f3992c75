//! Account storage interface and the in-memory implementation
//!
//! The store maps usernames to credentials and to the shared player record.
//! Accounts are created at sign-up and never deleted.

use crate::error::{MatchmakingError, Result};
use crate::player::record::{Player, PlayerHandle};
use crate::types::{PlayerId, PlayerStatus, Rating};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Trait for account storage operations
pub trait AccountStore: Send + Sync {
    /// Create an account and its player.
    ///
    /// Returns `None` when the username is already taken or empty.
    fn sign_up(&self, username: &str, password: &str) -> Result<Option<PlayerHandle>>;

    /// Check credentials and return the player when they match exactly.
    ///
    /// An unknown username and a wrong password are indistinguishable.
    fn sign_in(&self, username: &str, password: &str) -> Result<Option<PlayerHandle>>;

    /// Look up a player by username
    fn get_player(&self, username: &str) -> Result<Option<PlayerHandle>>;

    /// Get total number of accounts
    fn player_count(&self) -> Result<usize>;
}

struct AccountEntry {
    password: String,
    player: PlayerHandle,
}

/// In-memory account store
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<String, AccountEntry>>,
    initial_rating: Rating,
}

impl InMemoryAccountStore {
    /// Create an empty store whose new players start at `initial_rating`
    pub fn new(initial_rating: Rating) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            initial_rating,
        }
    }
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new(1200)
    }
}

impl AccountStore for InMemoryAccountStore {
    fn sign_up(&self, username: &str, password: &str) -> Result<Option<PlayerHandle>> {
        if username.is_empty() {
            return Ok(None);
        }

        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| MatchmakingError::poisoned("accounts"))?;

        if accounts.contains_key(username) {
            debug!("Sign-up rejected, username '{}' already exists", username);
            return Ok(None);
        }

        let id = accounts.len() as PlayerId;
        let player = PlayerHandle::new(Player::new(id, username, self.initial_rating));
        accounts.insert(
            username.to_string(),
            AccountEntry {
                password: password.to_string(),
                player: player.clone(),
            },
        );

        debug!("Created account '{}' with player id {}", username, id);
        Ok(Some(player))
    }

    fn sign_in(&self, username: &str, password: &str) -> Result<Option<PlayerHandle>> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| MatchmakingError::poisoned("accounts"))?;

        match accounts.get(username) {
            Some(entry) if entry.password == password => {
                // A queued or playing player keeps its status
                entry
                    .player
                    .transition_status(PlayerStatus::Offline, PlayerStatus::Online)?;
                Ok(Some(entry.player.clone()))
            }
            _ => Ok(None),
        }
    }

    fn get_player(&self, username: &str) -> Result<Option<PlayerHandle>> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| MatchmakingError::poisoned("accounts"))?;

        Ok(accounts.get(username).map(|entry| entry.player.clone()))
    }

    fn player_count(&self) -> Result<usize> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| MatchmakingError::poisoned("accounts"))?;

        Ok(accounts.len())
    }
}
