//! Lobby controller: plays the match of one lobby
//!
//! Each lobby gets a dedicated task that moves it through
//! Filling → Predicting → Simulating → Reporting → Done. Member sessions are
//! woken at Predicting with a [`MatchTicket`] and receive their
//! [`MatchReport`] through it at Reporting.

use crate::config::MatchmakingSettings;
use crate::error::{MatchmakingError, Result};
use crate::leaderboard::Leaderboard;
use crate::lobby::instance::simulate_match;
use crate::lobby::manager::{ActiveLobbies, LobbyHandle, LobbyManagerStats};
use crate::matchmaking::QueueEntry;
use crate::metrics::MetricsCollector;
use crate::player::PlayerHandle;
use crate::protocol::{MatchReport, PlayerSummary, PredictionSummary};
use crate::rating::{OutcomePredictor, Prediction, RatingCalculator, Standing};
use crate::types::{LobbyId, MatchId, PlayerId, PlayerStatus, Rating, RatingChange};
use crate::utils::generate_match_id;
use rand::Rng;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Handed to a member session once its lobby is full
#[derive(Debug)]
pub struct MatchTicket {
    pub lobby_id: LobbyId,
    pub match_id: MatchId,
    /// Resolves with the match report once the match has been played
    pub result: oneshot::Receiver<MatchReport>,
}

/// Shared services a controller needs to play and record a match
#[derive(Clone)]
pub struct MatchContext {
    pub settings: MatchmakingSettings,
    pub predictor: OutcomePredictor,
    pub rating_calculator: Arc<dyn RatingCalculator>,
    pub leaderboard: Arc<Leaderboard>,
    pub metrics_collector: Arc<MetricsCollector>,
    pub active_lobbies: Arc<ActiveLobbies>,
    pub stats: Arc<RwLock<LobbyManagerStats>>,
    pub cancel: CancellationToken,
}

pub struct LobbyController {
    lobby: Arc<LobbyHandle>,
    context: MatchContext,
    match_id: MatchId,
}

impl LobbyController {
    pub fn new(lobby: Arc<LobbyHandle>, context: MatchContext) -> Self {
        Self {
            lobby,
            context,
            match_id: generate_match_id(),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drive the lobby to a terminal state and deregister it
    pub async fn run(self) {
        let lobby_id = self.lobby.id();

        match self.play().await {
            Ok(true) => {
                info!("Match {} in lobby {} completed", self.match_id, lobby_id);
            }
            Ok(false) => {
                info!("Lobby {} closed before it filled", lobby_id);
                self.abandon();
            }
            Err(e) => {
                error!(
                    "Match {} in lobby {} aborted: {}",
                    self.match_id, lobby_id, e
                );
                self.context.metrics_collector.record_match_aborted();
                if let Ok(mut stats) = self.context.stats.write() {
                    stats.matches_aborted += 1;
                }
                self.abandon();
            }
        }

        if let Err(e) = self.context.active_lobbies.remove(lobby_id) {
            error!("Failed to deregister lobby {}: {}", lobby_id, e);
        }
        self.context.metrics_collector.record_lobby_closed();
    }

    fn abandon(&self) {
        match self.lobby.lock() {
            Ok(mut lobby) => lobby.mark_aborted(),
            Err(e) => error!("Failed to abandon lobby {}: {}", self.lobby.id(), e),
        }
    }

    /// Play the match. Returns `false` if shutdown interrupted filling.
    async fn play(&self) -> Result<bool> {
        let lobby_id = self.lobby.id();

        // Filling
        if !self.lobby.wait_until_full(&self.context.cancel).await? {
            return Ok(false);
        }

        // Predicting
        let members = self.lobby.lock()?.mark_predicting()?;
        let players: Vec<PlayerHandle> = members.iter().map(|m| m.player.clone()).collect();
        let roster = players
            .iter()
            .map(|player| -> Result<(PlayerId, Rating)> { Ok((player.id(), player.rating()?)) })
            .collect::<Result<Vec<_>>>()?;

        let before = ranked_summaries(&players)?;
        let timer = self.context.metrics_collector.start_timer();
        let prediction = self.context.predictor.predict(&roster)?;
        self.context.metrics_collector.record_prediction(timer.stop());
        let predictions = prediction_summaries(&players, &prediction)?;

        let results = self.issue_tickets(members)?;
        info!(
            "Match {} found in lobby {}: {}",
            self.match_id,
            lobby_id,
            players
                .iter()
                .map(PlayerHandle::username)
                .collect::<Vec<_>>()
                .join(", ")
        );

        // Simulating
        self.lobby.lock()?.mark_simulating()?;
        let mut order: Vec<PlayerId> = roster.iter().map(|&(id, _)| id).collect();
        simulate_match(&mut order, &prediction.odds, &mut rand::thread_rng())?;
        let standings: Vec<PlayerHandle> = order
            .iter()
            .map(|&id| find_player(&players, id).cloned())
            .collect::<Result<_>>()?;

        let changes = if self.context.settings.rated {
            self.apply_ratings(&standings, &prediction)?
        } else {
            Vec::new()
        };

        let duration = self.match_duration();
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }

        // Reporting
        self.lobby.lock()?.mark_reporting()?;
        let report = MatchReport {
            before,
            predictions,
            after: ranked_summaries(&standings)?,
        };

        if self.context.settings.rated {
            self.context.leaderboard.refresh(&players)?;
        }

        // Counted before any member sees its report
        self.context.active_lobbies.remove(lobby_id)?;
        self.context
            .metrics_collector
            .record_match_completed(&changes);
        {
            let mut stats = self
                .context
                .stats
                .write()
                .map_err(|_| MatchmakingError::poisoned("stats"))?;
            stats.matches_completed += 1;
        }

        for (player, result) in players.iter().zip(results) {
            player.transition_status(PlayerStatus::InGame, PlayerStatus::Online)?;
            if result.send(report.clone()).is_err() {
                debug!(
                    "Session of player '{}' is gone, dropping match report",
                    player.username()
                );
            }
        }

        // Done
        self.lobby.lock()?.mark_done()?;
        Ok(true)
    }

    /// Flip members to IN GAME and hand each session its ticket.
    ///
    /// Returns the result senders in roster order.
    fn issue_tickets(
        &self,
        members: Vec<QueueEntry>,
    ) -> Result<Vec<oneshot::Sender<MatchReport>>> {
        let mut results = Vec::with_capacity(members.len());

        for member in members {
            let (result, receiver) = oneshot::channel();
            member.player.set_status(PlayerStatus::InGame)?;

            let ticket = MatchTicket {
                lobby_id: self.lobby.id(),
                match_id: self.match_id,
                result: receiver,
            };
            if member.ticket.send(ticket).is_err() {
                debug!(
                    "Session of player '{}' is gone, match continues without it",
                    member.player.username()
                );
            }
            results.push(result);
        }

        Ok(results)
    }

    /// Apply rating changes and win/loss records, `standings` first place first
    fn apply_ratings(
        &self,
        standings: &[PlayerHandle],
        prediction: &Prediction,
    ) -> Result<Vec<RatingChange>> {
        let timer = self.context.metrics_collector.start_timer();

        let placements = standings
            .iter()
            .enumerate()
            .map(|(position, player)| -> Result<Standing> {
                let expected_score = prediction
                    .placements
                    .expected_placement(player.id())
                    .ok_or_else(|| missing_prediction(player))?;
                Ok(Standing {
                    player_id: player.id(),
                    rating: player.rating()?,
                    expected_score,
                    rank: position as u32 + 1,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let changes = self
            .context
            .rating_calculator
            .calculate_rating_changes(&placements)?;

        for change in &changes {
            let player = find_player(standings, change.player_id)?;
            let mut record = player.write()?;
            record.set_rating(change.new_rating);
            if change.rank == 1 {
                record.record_win();
            } else {
                record.record_loss();
            }
            debug!(
                "Player '{}' finished {} (expected {:.2}): {} -> {}",
                record.username,
                change.rank,
                change.expected_score,
                change.old_rating,
                change.new_rating
            );
        }

        debug!("Rating update took {:?}", timer.stop());
        Ok(changes)
    }

    fn match_duration(&self) -> Duration {
        let (min, max) = self.context.settings.match_duration_range();
        if min >= max {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }
}

fn find_player(players: &[PlayerHandle], id: PlayerId) -> Result<&PlayerHandle> {
    players
        .iter()
        .find(|player| player.id() == id)
        .ok_or_else(|| {
            MatchmakingError::InvariantViolation {
                message: format!("Player {} is not in the roster", id),
            }
            .into()
        })
}

fn missing_prediction(player: &PlayerHandle) -> MatchmakingError {
    MatchmakingError::InvariantViolation {
        message: format!("No placement prediction for player {}", player.id()),
    }
}

/// Summaries ranked by position, 1 = first
fn ranked_summaries(players: &[PlayerHandle]) -> Result<Vec<PlayerSummary>> {
    players
        .iter()
        .enumerate()
        .map(|(position, player)| -> Result<PlayerSummary> {
            Ok(PlayerSummary::ranked(&*player.read()?, position as u32 + 1))
        })
        .collect()
}

fn prediction_summaries(
    players: &[PlayerHandle],
    prediction: &Prediction,
) -> Result<Vec<PredictionSummary>> {
    players
        .iter()
        .map(|player| -> Result<PredictionSummary> {
            let expected = prediction
                .placements
                .expected_placement(player.id())
                .ok_or_else(|| missing_prediction(player))?;
            Ok(PredictionSummary::new(&*player.read()?, expected))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lobby::instance::{LobbyInstance, LobbyState};
    use crate::player::Player;
    use crate::rating::EloPlacementCalculator;

    fn context(rated: bool) -> MatchContext {
        MatchContext {
            settings: MatchmakingSettings {
                rated,
                ..MatchmakingSettings::instant()
            },
            predictor: OutcomePredictor::new(),
            rating_calculator: Arc::new(EloPlacementCalculator::default()),
            leaderboard: Arc::new(Leaderboard::new()),
            metrics_collector: Arc::new(MetricsCollector::new().unwrap()),
            active_lobbies: Arc::new(ActiveLobbies::new()),
            stats: Arc::new(RwLock::new(LobbyManagerStats::default())),
            cancel: CancellationToken::new(),
        }
    }

    fn member(
        id: PlayerId,
        rating: Rating,
    ) -> (PlayerHandle, QueueEntry, oneshot::Receiver<MatchTicket>) {
        let player = PlayerHandle::new(Player::new(id, format!("player{}", id), rating));
        player.set_status(PlayerStatus::InQueue).unwrap();
        let (entry, ticket) = QueueEntry::new(player.clone()).unwrap();
        (player, entry, ticket)
    }

    fn full_lobby(entries: Vec<QueueEntry>) -> Arc<LobbyHandle> {
        let handle = Arc::new(LobbyHandle::new(LobbyInstance::new(entries.len(), 40000.0)));
        for entry in entries {
            handle.fill(entry).unwrap().unwrap();
        }
        handle
    }

    #[tokio::test]
    async fn test_rated_match_between_equal_players() {
        let context = context(true);
        let (alice, a, ticket_a) = member(0, 1200);
        let (bob, b, ticket_b) = member(1, 1200);
        let lobby = full_lobby(vec![a, b]);
        context.active_lobbies.insert(lobby.clone()).unwrap();

        let leaderboard = context.leaderboard.clone();
        let active = context.active_lobbies.clone();
        LobbyController::new(lobby.clone(), context).run().await;

        let ticket = ticket_a.await.unwrap();
        assert_eq!(ticket.lobby_id, lobby.id());
        let report = ticket.result.await.unwrap();
        let report_b = ticket_b.await.unwrap().result.await.unwrap();
        assert_eq!(report, report_b);

        assert_eq!(report.before.len(), 2);
        assert_eq!(report.predictions[0].expected_rank, 1.5);
        assert_eq!(report.after[0].rank, Some(1));
        assert_eq!(report.after[0].rating, 1216);
        assert_eq!(report.after[1].rating, 1184);

        let alice = alice.snapshot().unwrap();
        let bob = bob.snapshot().unwrap();
        assert_eq!(alice.games, 1);
        assert_eq!(bob.games, 1);
        assert_eq!(alice.wins + bob.wins, 1);
        assert_eq!(alice.losses + bob.losses, 1);
        assert_eq!(alice.rating + bob.rating, 2400);
        assert_eq!(alice.status, PlayerStatus::Online);
        assert_eq!(bob.status, PlayerStatus::Online);

        assert_eq!(leaderboard.len().unwrap(), 2);
        assert!(active.is_empty().unwrap());
        assert_eq!(lobby.state().unwrap(), LobbyState::Done);
    }

    #[tokio::test]
    async fn test_unrated_match_leaves_ratings() {
        let context = context(false);
        let (alice, a, ticket_a) = member(0, 1300);
        let (bob, b, _ticket_b) = member(1, 1250);
        let lobby = full_lobby(vec![a, b]);
        let leaderboard = context.leaderboard.clone();

        LobbyController::new(lobby, context).run().await;

        let report = ticket_a.await.unwrap().result.await.unwrap();
        assert_eq!(report.after.len(), 2);
        assert_eq!(alice.rating().unwrap(), 1300);
        assert_eq!(bob.rating().unwrap(), 1250);
        assert_eq!(alice.snapshot().unwrap().games, 0);
        assert!(leaderboard.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_departed_session_does_not_stop_match() {
        let context = context(true);
        let (_alice, a, ticket_a) = member(0, 1200);
        let (_bob, b, ticket_b) = member(1, 1200);
        drop(ticket_a);
        let lobby = full_lobby(vec![a, b]);

        LobbyController::new(lobby.clone(), context).run().await;

        assert!(ticket_b.await.unwrap().result.await.is_ok());
        assert_eq!(lobby.state().unwrap(), LobbyState::Done);
    }

    #[tokio::test]
    async fn test_status_changed_mid_match_is_kept() {
        let mut context = context(true);
        context.settings.min_match_duration_ms = 50;
        context.settings.max_match_duration_ms = 50;
        let (alice, a, ticket_a) = member(0, 1200);
        let (_bob, b, _ticket_b) = member(1, 1200);
        let lobby = full_lobby(vec![a, b]);

        let controller = LobbyController::new(lobby, context);
        let handle = tokio::spawn(controller.run());

        let ticket = ticket_a.await.unwrap();
        // Sessions never leave a player OFFLINE while IN GAME; this only pins
        // the IN GAME -> ONLINE compare-and-set at delivery
        alice.set_status(PlayerStatus::Offline).unwrap();
        handle.await.unwrap();

        assert!(ticket.result.await.is_ok());
        assert_eq!(alice.status().unwrap(), PlayerStatus::Offline);
    }

    #[tokio::test]
    async fn test_cancelled_while_filling() {
        let context = context(true);
        let cancel = context.cancel.clone();
        let handle = Arc::new(LobbyHandle::new(LobbyInstance::new(2, 40000.0)));
        let (_alice, a, ticket_a) = member(0, 1200);
        handle.fill(a).unwrap().unwrap();

        let task = LobbyController::new(handle.clone(), context).spawn();
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(handle.state().unwrap(), LobbyState::Aborted);
        // The waiting session learns that no match is coming
        assert!(ticket_a.await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_roster_aborts_loudly() {
        let context = context(true);
        let stats = context.stats.clone();
        let player = PlayerHandle::new(Player::new(0, "twin", 1200));
        let (first, ticket_a) = QueueEntry::new(player.clone()).unwrap();
        let (second, ticket_b) = QueueEntry::new(player).unwrap();
        let lobby = full_lobby(vec![first, second]);

        LobbyController::new(lobby.clone(), context).run().await;

        assert_eq!(lobby.state().unwrap(), LobbyState::Aborted);
        assert!(ticket_a.await.is_err());
        assert!(ticket_b.await.is_err());
        assert_eq!(stats.read().unwrap().matches_aborted, 1);
    }
}
