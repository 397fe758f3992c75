//! Dispatch pool servicing the matchmaking queue
//!
//! A fixed number of workers each block on the queue, pop the head entry and
//! hand it to the lobby manager for admission.

use crate::lobby::LobbyManager;
use crate::matchmaking::queue::MatchmakingQueue;
use crate::metrics::MetricsCollector;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct DispatchPool {
    workers: Vec<JoinHandle<()>>,
    alive: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl DispatchPool {
    /// Spawn `worker_count` workers draining `queue` into `lobby_manager`
    pub fn start(
        worker_count: usize,
        queue: Arc<MatchmakingQueue>,
        lobby_manager: Arc<LobbyManager>,
        metrics_collector: Arc<MetricsCollector>,
        cancel: CancellationToken,
    ) -> Self {
        let alive = Arc::new(AtomicUsize::new(0));

        let workers = (0..worker_count)
            .map(|worker_id| {
                alive.fetch_add(1, Ordering::SeqCst);
                let worker = Worker {
                    id: worker_id,
                    queue: queue.clone(),
                    lobby_manager: lobby_manager.clone(),
                    metrics_collector: metrics_collector.clone(),
                    cancel: cancel.clone(),
                    alive: alive.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        info!("Started {} dispatch workers", worker_count);

        Self {
            workers,
            alive,
            cancel,
        }
    }

    /// Number of workers still servicing the queue
    pub fn alive_workers(&self) -> usize {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Shared counter of live workers
    pub fn alive_counter(&self) -> Arc<AtomicUsize> {
        self.alive.clone()
    }

    /// Cancel the workers and wait up to `timeout` for them to exit
    pub async fn shutdown(self, timeout: Duration) {
        self.cancel.cancel();

        let count = self.workers.len();
        let join_all = futures::future::join_all(self.workers);
        if tokio::time::timeout(timeout, join_all).await.is_err() {
            warn!("Dispatch workers did not stop within {:?}", timeout);
        } else {
            info!("All {} dispatch workers stopped", count);
        }
    }
}

struct Worker {
    id: usize,
    queue: Arc<MatchmakingQueue>,
    lobby_manager: Arc<LobbyManager>,
    metrics_collector: Arc<MetricsCollector>,
    cancel: CancellationToken,
    alive: Arc<AtomicUsize>,
}

impl Worker {
    async fn run(self) {
        debug!("Dispatch worker {} started", self.id);

        loop {
            let entry = match self.queue.pop(&self.cancel).await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    error!("Dispatch worker {} cannot read the queue: {}", self.id, e);
                    break;
                }
            };

            if let Ok(depth) = self.queue.len() {
                self.metrics_collector.record_queue_depth(depth);
            }

            let username = entry.player.username().to_string();
            match self.lobby_manager.handle_queue_entry(entry).await {
                Ok(lobby_id) => {
                    debug!(
                        "Worker {} placed player '{}' in lobby {}",
                        self.id, username, lobby_id
                    );
                }
                Err(e) => {
                    // The entry is dropped with the error, which releases the
                    // waiting session.
                    error!(
                        "Worker {} failed to place player '{}': {}",
                        self.id, username, e
                    );
                }
            }
        }

        self.alive.fetch_sub(1, Ordering::SeqCst);
        debug!("Dispatch worker {} stopped", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchmakingSettings;
    use crate::leaderboard::Leaderboard;
    use crate::lobby::MatchTicket;
    use crate::matchmaking::QueueEntry;
    use crate::player::{Player, PlayerHandle};
    use crate::rating::EloPlacementCalculator;
    use crate::types::PlayerStatus;
    use tokio::sync::oneshot;

    struct Harness {
        queue: Arc<MatchmakingQueue>,
        manager: Arc<LobbyManager>,
        pool: DispatchPool,
    }

    fn start_pool(workers: usize) -> Harness {
        let cancel = CancellationToken::new();
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let queue = Arc::new(MatchmakingQueue::new());
        let manager = Arc::new(LobbyManager::new(
            MatchmakingSettings::instant(),
            Arc::new(EloPlacementCalculator::default()),
            Arc::new(Leaderboard::new()),
            metrics.clone(),
            cancel.clone(),
        ));
        let pool = DispatchPool::start(workers, queue.clone(), manager.clone(), metrics, cancel);
        Harness {
            queue,
            manager,
            pool,
        }
    }

    fn queued(
        id: u64,
        rating: u32,
    ) -> (PlayerHandle, QueueEntry, oneshot::Receiver<MatchTicket>) {
        let player = PlayerHandle::new(Player::new(id, format!("player{}", id), rating));
        player.set_status(PlayerStatus::InQueue).unwrap();
        let (entry, ticket) = QueueEntry::new(player.clone()).unwrap();
        (player, entry, ticket)
    }

    #[tokio::test]
    async fn test_workers_start_and_stop() {
        let harness = start_pool(3);
        assert_eq!(harness.pool.worker_count(), 3);
        assert_eq!(harness.pool.alive_workers(), 3);

        let alive = harness.pool.alive_counter();
        harness.pool.shutdown(Duration::from_secs(1)).await;
        assert_eq!(alive.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pool_matches_two_queued_players() {
        let harness = start_pool(2);

        let (alice, entry_a, ticket_a) = queued(0, 1200);
        let (bob, entry_b, ticket_b) = queued(1, 1250);
        harness.queue.push(entry_a).unwrap();
        harness.queue.push(entry_b).unwrap();

        let ticket_a = tokio::time::timeout(Duration::from_secs(5), ticket_a)
            .await
            .unwrap()
            .unwrap();
        let ticket_b = tokio::time::timeout(Duration::from_secs(5), ticket_b)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ticket_a.lobby_id, ticket_b.lobby_id);
        assert_eq!(ticket_a.match_id, ticket_b.match_id);

        let report = ticket_a.result.await.unwrap();
        assert_eq!(report.after.len(), 2);
        ticket_b.result.await.unwrap();

        assert_eq!(alice.status().unwrap(), PlayerStatus::Online);
        assert_eq!(bob.status().unwrap(), PlayerStatus::Online);
        assert!(harness.queue.is_empty().unwrap());
        assert_eq!(harness.manager.get_stats().unwrap().players_admitted, 2);

        harness.pool.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_distant_ratings_get_separate_lobbies() {
        let harness = start_pool(1);

        let (_low, entry_low, _ticket_low) = queued(0, 1000);
        let (_high, entry_high, _ticket_high) = queued(1, 2000);
        harness.queue.push(entry_low).unwrap();
        harness.queue.push(entry_high).unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while harness.manager.get_stats().unwrap().players_admitted < 2 {
            assert!(tokio::time::Instant::now() < deadline);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let stats = harness.manager.get_stats().unwrap();
        assert_eq!(stats.lobbies_created, 2);
        assert_eq!(stats.active_lobbies, 2);

        harness.pool.shutdown(Duration::from_secs(1)).await;
    }
}
