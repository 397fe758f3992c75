//! Lobby instance implementation and lifecycle management
//!
//! A lobby is a fixed-capacity roster filled from the matchmaking queue,
//! played once by its controller and then discarded.

use crate::error::{MatchmakingError, Result};
use crate::lobby::matching::{admits, LobbySnapshot};
use crate::matchmaking::QueueEntry;
use crate::rating::OddsTable;
use crate::types::{LobbyId, PlayerId, Rating};
use crate::utils::{current_timestamp, generate_lobby_id};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Possible states of a lobby
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobbyState {
    /// Lobby is admitting players
    Filling,
    /// Lobby is full, outcome prediction is running
    Predicting,
    /// Match is being played
    Simulating,
    /// Results are being delivered
    Reporting,
    /// Lobby has finished (terminal state)
    Done,
    /// Match could not be played (terminal state)
    Aborted,
}

impl LobbyState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LobbyState::Done | LobbyState::Aborted)
    }
}

/// Concrete implementation of a lobby instance
#[derive(Debug)]
pub struct LobbyInstance {
    id: LobbyId,
    capacity: usize,
    max_variance: f64,
    state: LobbyState,
    members: Vec<QueueEntry>,
    created_at: DateTime<Utc>,
}

impl LobbyInstance {
    /// Create an empty lobby
    pub fn new(capacity: usize, max_variance: f64) -> Self {
        Self {
            id: generate_lobby_id(),
            capacity,
            max_variance,
            state: LobbyState::Filling,
            members: Vec::with_capacity(capacity),
            created_at: current_timestamp(),
        }
    }

    pub fn id(&self) -> LobbyId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn state(&self) -> LobbyState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }

    /// Ratings of the admitted players, in admission order
    pub fn ratings(&self) -> Vec<Rating> {
        self.members.iter().map(|member| member.rating).collect()
    }

    /// Ids of the admitted players, in admission order
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.members.iter().map(|member| member.player.id()).collect()
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.members.iter().any(|member| member.player.id() == player_id)
    }

    /// Check whether a player with `rating` would be admitted right now
    pub fn accepts(&self, rating: Rating) -> bool {
        self.state == LobbyState::Filling
            && !self.is_full()
            && admits(&self.ratings(), rating, self.max_variance)
    }

    /// Admit a queue entry.
    ///
    /// A rejected entry is handed back so the caller can place it elsewhere.
    /// A player already on the roster is always rejected.
    pub fn fill(&mut self, entry: QueueEntry) -> std::result::Result<(), QueueEntry> {
        if self.contains(entry.player.id()) || !self.accepts(entry.rating) {
            return Err(entry);
        }
        self.members.push(entry);
        Ok(())
    }

    pub fn snapshot(&self) -> LobbySnapshot {
        LobbySnapshot {
            lobby_id: self.id,
            ratings: self.ratings(),
            player_ids: self.player_ids(),
            capacity: self.capacity,
        }
    }

    /// Move a full lobby to prediction and hand its members to the caller
    pub fn mark_predicting(&mut self) -> Result<Vec<QueueEntry>> {
        if self.state != LobbyState::Filling || !self.is_full() {
            return Err(MatchmakingError::InternalError {
                message: format!("Lobby {} is not ready to play", self.id),
            }
            .into());
        }

        self.state = LobbyState::Predicting;
        Ok(std::mem::take(&mut self.members))
    }

    pub fn mark_simulating(&mut self) -> Result<()> {
        self.transition(LobbyState::Predicting, LobbyState::Simulating)
    }

    pub fn mark_reporting(&mut self) -> Result<()> {
        self.transition(LobbyState::Simulating, LobbyState::Reporting)
    }

    pub fn mark_done(&mut self) -> Result<()> {
        self.transition(LobbyState::Reporting, LobbyState::Done)
    }

    /// Abandon the lobby from any non-terminal state
    pub fn mark_aborted(&mut self) {
        if !self.state.is_terminal() {
            self.state = LobbyState::Aborted;
            self.members.clear();
        }
    }

    fn transition(&mut self, from: LobbyState, to: LobbyState) -> Result<()> {
        if self.state != from {
            return Err(MatchmakingError::InternalError {
                message: format!(
                    "Lobby {} must be in {:?} state to move to {:?}, found {:?}",
                    self.id, from, to, self.state
                ),
            }
            .into());
        }

        self.state = to;
        Ok(())
    }
}

/// Play a match over `order`, starting from admission order.
///
/// A single pass over every pair `i < j`: one uniform draw per pair, and the
/// two positions swap when the draw is at least the odds of the player at
/// `i` beating the player at `j`. Upsets are possible; the result is not a
/// sort.
pub fn simulate_match<R: Rng + ?Sized>(
    order: &mut [PlayerId],
    odds: &OddsTable,
    rng: &mut R,
) -> Result<()> {
    for i in 0..order.len() {
        for j in (i + 1)..order.len() {
            let win = odds.get(order[i], order[j]).ok_or_else(|| {
                MatchmakingError::InvariantViolation {
                    message: format!("No odds for {} against {}", order[i], order[j]),
                }
            })?;

            let draw: f64 = rng.gen();
            if draw >= win {
                order.swap(i, j);
            }
        }
    }
    Ok(())
}
