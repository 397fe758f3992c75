//! Shared FIFO of players waiting for a competitive match

use crate::error::{MatchmakingError, Result};
use crate::lobby::MatchTicket;
use crate::player::PlayerHandle;
use crate::types::Rating;
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::{oneshot, Notify};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A player waiting in the queue.
///
/// The rating is captured at queue time; it cannot change until the
/// player's match completes.
#[derive(Debug)]
pub struct QueueEntry {
    pub player: PlayerHandle,
    pub rating: Rating,
    pub joined_at: DateTime<Utc>,
    /// Receives the match ticket once the player's lobby is full
    pub ticket: oneshot::Sender<MatchTicket>,
}

impl QueueEntry {
    /// Entry for `player` plus the receiver its session waits on
    pub fn new(player: PlayerHandle) -> Result<(Self, oneshot::Receiver<MatchTicket>)> {
        let rating = player.rating()?;
        let (ticket, receiver) = oneshot::channel();
        let entry = Self {
            player,
            rating,
            joined_at: current_timestamp(),
            ticket,
        };
        Ok((entry, receiver))
    }
}

/// Matchmaking queue serviced by the dispatch pool
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    entries: Mutex<VecDeque<QueueEntry>>,
    available: Notify,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<QueueEntry>>> {
        self.entries
            .lock()
            .map_err(|_| MatchmakingError::poisoned("queue").into())
    }

    /// Append an entry and wake one worker. Returns the new queue depth.
    pub fn push(&self, entry: QueueEntry) -> Result<usize> {
        let depth = {
            let mut entries = self.lock()?;
            debug!("Queueing player '{}'", entry.player.username());
            entries.push_back(entry);
            entries.len()
        };
        self.available.notify_one();
        Ok(depth)
    }

    /// Remove the head of the queue without waiting
    pub fn try_pop(&self) -> Result<Option<QueueEntry>> {
        Ok(self.lock()?.pop_front())
    }

    /// Wait for the head of the queue.
    ///
    /// Returns `None` once `cancel` fires.
    pub async fn pop(&self, cancel: &CancellationToken) -> Result<Option<QueueEntry>> {
        loop {
            let notified = self.available.notified();
            if let Some(entry) = self.try_pop()? {
                return Ok(Some(entry));
            }

            tokio::select! {
                _ = notified => {}
                _ = cancel.cancelled() => return Ok(None),
            }
        }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
}
