//! Lobby manager implementation for handling multiple lobby instances
//!
//! This module provides the LobbyManager that places queued players into
//! lobbies, creates lobbies on demand and starts one controller per lobby.

use crate::config::MatchmakingSettings;
use crate::error::{MatchmakingError, Result};
use crate::leaderboard::Leaderboard;
use crate::lobby::controller::{LobbyController, MatchContext};
use crate::lobby::instance::{LobbyInstance, LobbyState};
use crate::lobby::matching::{LobbyMatcher, LobbySnapshot, MatchingResult, VarianceLobbyMatcher};
use crate::matchmaking::QueueEntry;
use crate::metrics::MetricsCollector;
use crate::rating::{OutcomePredictor, RatingCalculator};
use crate::types::LobbyId;
use crate::utils::current_timestamp;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Statistics about lobby manager operations
#[derive(Debug, Clone, Default)]
pub struct LobbyManagerStats {
    /// Total number of lobbies created
    pub lobbies_created: u64,
    /// Total number of players admitted into lobbies
    pub players_admitted: u64,
    /// Total number of matches played to completion
    pub matches_completed: u64,
    /// Total number of matches abandoned
    pub matches_aborted: u64,
    /// Current number of active lobbies
    pub active_lobbies: usize,
}

/// A lobby shared between dispatch workers and its controller
#[derive(Debug)]
pub struct LobbyHandle {
    id: LobbyId,
    lobby: Mutex<LobbyInstance>,
    full: Notify,
}

impl LobbyHandle {
    pub fn new(lobby: LobbyInstance) -> Self {
        Self {
            id: lobby.id(),
            lobby: Mutex::new(lobby),
            full: Notify::new(),
        }
    }

    pub fn id(&self) -> LobbyId {
        self.id
    }

    /// Acquire the lobby lock
    pub fn lock(&self) -> Result<MutexGuard<'_, LobbyInstance>> {
        self.lobby
            .lock()
            .map_err(|_| MatchmakingError::poisoned("lobby").into())
    }

    /// Admit an entry under the lobby lock.
    ///
    /// On success returns whether the lobby is now full; a rejected entry is
    /// handed back.
    pub fn fill(&self, entry: QueueEntry) -> Result<std::result::Result<bool, QueueEntry>> {
        let full = {
            let mut lobby = self.lock()?;
            if let Err(rejected) = lobby.fill(entry) {
                return Ok(Err(rejected));
            }
            lobby.is_full()
        };

        if full {
            self.full.notify_one();
        }
        Ok(Ok(full))
    }

    pub fn is_full(&self) -> Result<bool> {
        Ok(self.lock()?.is_full())
    }

    pub fn state(&self) -> Result<LobbyState> {
        Ok(self.lock()?.state())
    }

    pub fn snapshot(&self) -> Result<LobbySnapshot> {
        Ok(self.lock()?.snapshot())
    }

    /// Wait until the lobby reaches capacity.
    ///
    /// Returns `false` if `cancel` fires first.
    pub async fn wait_until_full(&self, cancel: &CancellationToken) -> Result<bool> {
        loop {
            let notified = self.full.notified();
            if self.is_full()? {
                return Ok(true);
            }

            tokio::select! {
                _ = notified => {}
                _ = cancel.cancelled() => return Ok(false),
            }
        }
    }
}

/// Lobbies that have not finished, in creation order
#[derive(Debug, Default)]
pub struct ActiveLobbies {
    lobbies: RwLock<Vec<Arc<LobbyHandle>>>,
}

impl ActiveLobbies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, lobby: Arc<LobbyHandle>) -> Result<()> {
        self.lobbies
            .write()
            .map_err(|_| MatchmakingError::poisoned("active lobbies"))?
            .push(lobby);
        Ok(())
    }

    /// Remove a lobby; returns whether it was present
    pub fn remove(&self, lobby_id: LobbyId) -> Result<bool> {
        let mut lobbies = self
            .lobbies
            .write()
            .map_err(|_| MatchmakingError::poisoned("active lobbies"))?;
        let before = lobbies.len();
        lobbies.retain(|lobby| lobby.id() != lobby_id);
        Ok(lobbies.len() != before)
    }

    pub fn get(&self, lobby_id: LobbyId) -> Result<Option<Arc<LobbyHandle>>> {
        let lobbies = self
            .lobbies
            .read()
            .map_err(|_| MatchmakingError::poisoned("active lobbies"))?;
        Ok(lobbies.iter().find(|lobby| lobby.id() == lobby_id).cloned())
    }

    /// Snapshots of the lobbies still admitting players, in creation order.
    ///
    /// Lobby locks are taken one at a time.
    pub fn snapshots(&self) -> Result<Vec<LobbySnapshot>> {
        let lobbies: Vec<Arc<LobbyHandle>> = self
            .lobbies
            .read()
            .map_err(|_| MatchmakingError::poisoned("active lobbies"))?
            .clone();

        let mut snapshots = Vec::with_capacity(lobbies.len());
        for lobby in lobbies {
            let lobby = lobby.lock()?;
            if lobby.state() == LobbyState::Filling && !lobby.is_full() {
                snapshots.push(lobby.snapshot());
            }
        }
        Ok(snapshots)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self
            .lobbies
            .read()
            .map_err(|_| MatchmakingError::poisoned("active lobbies"))?
            .len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// The main lobby manager
#[derive(Clone)]
pub struct LobbyManager {
    /// Lobby matcher for finding suitable lobbies
    lobby_matcher: Arc<dyn LobbyMatcher>,
    /// Capacity and admission threshold of new lobbies
    settings: MatchmakingSettings,
    /// Everything a lobby controller needs to play its match
    context: MatchContext,
    creating: Arc<Mutex<()>>,
}

impl LobbyManager {
    /// Create a lobby manager with the variance matcher from `settings`
    pub fn new(
        settings: MatchmakingSettings,
        rating_calculator: Arc<dyn RatingCalculator>,
        leaderboard: Arc<Leaderboard>,
        metrics_collector: Arc<MetricsCollector>,
        cancel: CancellationToken,
    ) -> Self {
        let lobby_matcher = Arc::new(VarianceLobbyMatcher::new(settings.max_rating_variance));
        Self::with_matcher(
            settings,
            lobby_matcher,
            rating_calculator,
            leaderboard,
            metrics_collector,
            cancel,
        )
    }

    /// Create with a custom matcher
    pub fn with_matcher(
        settings: MatchmakingSettings,
        lobby_matcher: Arc<dyn LobbyMatcher>,
        rating_calculator: Arc<dyn RatingCalculator>,
        leaderboard: Arc<Leaderboard>,
        metrics_collector: Arc<MetricsCollector>,
        cancel: CancellationToken,
    ) -> Self {
        let context = MatchContext {
            settings: settings.clone(),
            predictor: OutcomePredictor::new(),
            rating_calculator,
            leaderboard,
            metrics_collector,
            active_lobbies: Arc::new(ActiveLobbies::new()),
            stats: Arc::new(RwLock::new(LobbyManagerStats::default())),
            cancel,
        };

        Self {
            lobby_matcher,
            settings,
            context,
            creating: Arc::new(Mutex::new(())),
        }
    }

    /// Place a queued player into a lobby.
    ///
    /// The matcher decides from snapshots; the decision is re-checked under
    /// the chosen lobby's lock and recomputed if another worker got there
    /// first.
    pub async fn handle_queue_entry(&self, entry: QueueEntry) -> Result<LobbyId> {
        let timer = self.context.metrics_collector.start_timer();
        let waited = (current_timestamp() - entry.joined_at)
            .to_std()
            .unwrap_or_default();

        let mut entry = entry;
        loop {
            let snapshots = self.open_lobbies_for(&entry)?;

            match self
                .lobby_matcher
                .find_lobby_for_player(entry.rating, &snapshots)
            {
                MatchingResult::MatchedToLobby(lobby_id) => {
                    let Some(lobby) = self.context.active_lobbies.get(lobby_id)? else {
                        continue;
                    };

                    let username = entry.player.username().to_string();
                    match lobby.fill(entry)? {
                        Ok(full) => {
                            debug!(
                                "Admitted player '{}' to lobby {} (full: {})",
                                username, lobby_id, full
                            );
                            self.record_admission(waited, timer.stop())?;
                            return Ok(lobby_id);
                        }
                        Err(rejected) => {
                            debug!(
                                "Lobby {} no longer accepts player '{}', retrying",
                                lobby_id, username
                            );
                            entry = rejected;
                        }
                    }
                }
                MatchingResult::CreateNewLobby => {
                    // Workers open lobbies one at a time, and only after
                    // re-checking that no open lobby admits the player.
                    let _creating = self
                        .creating
                        .lock()
                        .map_err(|_| MatchmakingError::poisoned("lobby creation"))?;
                    let snapshots = self.open_lobbies_for(&entry)?;
                    if self
                        .lobby_matcher
                        .find_lobby_for_player(entry.rating, &snapshots)
                        != MatchingResult::CreateNewLobby
                    {
                        continue;
                    }

                    let lobby_id = self.create_lobby(entry)?;
                    self.record_admission(waited, timer.stop())?;
                    return Ok(lobby_id);
                }
            }
        }
    }

    /// Snapshots of the filling lobbies that do not already hold the player
    fn open_lobbies_for(&self, entry: &QueueEntry) -> Result<Vec<LobbySnapshot>> {
        let player_id = entry.player.id();
        let mut snapshots = self.context.active_lobbies.snapshots()?;
        snapshots.retain(|snapshot| !snapshot.contains(player_id));
        Ok(snapshots)
    }

    /// Create a lobby holding `entry`, register it and start its controller
    fn create_lobby(&self, entry: QueueEntry) -> Result<LobbyId> {
        let mut lobby =
            LobbyInstance::new(self.settings.lobby_capacity, self.settings.max_rating_variance);
        let lobby_id = lobby.id();
        let username = entry.player.username().to_string();

        if lobby.fill(entry).is_err() {
            return Err(MatchmakingError::InternalError {
                message: format!("New lobby {} rejected its first player", lobby_id),
            }
            .into());
        }

        let handle = Arc::new(LobbyHandle::new(lobby));
        self.context.active_lobbies.insert(handle.clone())?;
        LobbyController::new(handle, self.context.clone()).spawn();

        self.context.metrics_collector.record_lobby_created();
        {
            let mut stats = self
                .context
                .stats
                .write()
                .map_err(|_| MatchmakingError::poisoned("stats"))?;
            stats.lobbies_created += 1;
        }

        info!("Created lobby {} for player '{}'", lobby_id, username);
        Ok(lobby_id)
    }

    fn record_admission(
        &self,
        waited: std::time::Duration,
        decision: std::time::Duration,
    ) -> Result<()> {
        self.context
            .metrics_collector
            .record_admission(waited, decision);
        let mut stats = self
            .context
            .stats
            .write()
            .map_err(|_| MatchmakingError::poisoned("stats"))?;
        stats.players_admitted += 1;
        Ok(())
    }

    /// Look up an active lobby
    pub fn get_lobby(&self, lobby_id: LobbyId) -> Result<Option<Arc<LobbyHandle>>> {
        self.context.active_lobbies.get(lobby_id)
    }

    /// Number of lobbies that have not finished
    pub fn active_lobby_count(&self) -> Result<usize> {
        self.context.active_lobbies.len()
    }

    /// Get current manager statistics
    pub fn get_stats(&self) -> Result<LobbyManagerStats> {
        let mut stats = self
            .context
            .stats
            .read()
            .map_err(|_| MatchmakingError::poisoned("stats"))?
            .clone();
        stats.active_lobbies = self.context.active_lobbies.len()?;
        Ok(stats)
    }
}
