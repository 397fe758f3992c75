//! Main application state and service coordination
//!
//! This module contains the AppState that owns the shared matchmaking
//! components, the client listener, the dispatch pool and the background
//! tasks.

use crate::config::AppConfig;
use crate::leaderboard::Leaderboard;
use crate::lobby::{LobbyManager, LobbyManagerStats};
use crate::matchmaking::{DispatchPool, MatchmakingQueue};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector};
use crate::player::{AccountStore, InMemoryAccountStore};
use crate::rating::EloPlacementCalculator;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::session::{Session, SessionContext};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Core matchmaking components
    accounts: Arc<dyn AccountStore>,
    queue: Arc<MatchmakingQueue>,
    leaderboard: Arc<Leaderboard>,
    lobby_manager: Arc<LobbyManager>,

    metrics_collector: Arc<MetricsCollector>,

    /// Dispatch workers, present while the service runs
    dispatch_pool: Mutex<Option<DispatchPool>>,

    /// Background task handles (listener, health server, metrics updates)
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    listener_running: Arc<AtomicBool>,
    cancel: CancellationToken,
    is_running: Arc<RwLock<bool>>,
    started_at: Instant,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing {} matchmaking server", config.service.name);
        info!(
            "Configuration: listen={}, workers={}, capacity={}, rated={}",
            config.listen_addr(),
            config.matchmaking.dispatch_workers,
            config.matchmaking.lobby_capacity,
            config.matchmaking.rated
        );

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let rating_calculator = Arc::new(
            EloPlacementCalculator::new(config.rating.k_factor, config.rating.initial_rating)
                .map_err(|e| ServiceError::Configuration {
                    message: e.to_string(),
                })?,
        );

        let cancel = CancellationToken::new();
        let leaderboard = Arc::new(Leaderboard::new());
        let lobby_manager = Arc::new(LobbyManager::new(
            config.matchmaking.clone(),
            rating_calculator,
            leaderboard.clone(),
            metrics_collector.clone(),
            cancel.clone(),
        ));

        Ok(Self {
            accounts: Arc::new(InMemoryAccountStore::new(config.rating.initial_rating)),
            queue: Arc::new(MatchmakingQueue::new()),
            leaderboard,
            lobby_manager,
            metrics_collector,
            dispatch_pool: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            listener_running: Arc::new(AtomicBool::new(false)),
            cancel,
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
            config,
        })
    }

    /// Bind the client listener and start every service task.
    ///
    /// Returns the address the listener is bound to.
    pub async fn start(self: &Arc<Self>) -> Result<SocketAddr, ServiceError> {
        info!("Starting {} matchmaking server", self.config.service.name);

        let addr = self.config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServiceError::Bind {
                addr: addr.clone(),
                message: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| ServiceError::Bind {
            addr,
            message: e.to_string(),
        })?;

        *self.is_running.write().await = true;

        self.start_dispatch_pool()?;
        self.spawn_task(accept_loop(
            listener,
            self.session_context(),
            self.listener_running.clone(),
            self.cancel.clone(),
        ))?;
        self.listener_running.store(true, Ordering::SeqCst);

        if self.config.service.enable_health_server {
            self.start_health_server()?;
        } else {
            info!("Health server disabled");
        }
        self.start_background_tasks()?;

        info!("Matchmaking server listening on {}", local_addr);
        Ok(local_addr)
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown");

        *self.is_running.write().await = false;
        self.cancel.cancel();

        let pool = self
            .dispatch_pool
            .lock()
            .map_err(|_| ServiceError::BackgroundTask {
                message: "Dispatch pool lock poisoned".to_string(),
            })?
            .take();
        if let Some(pool) = pool {
            pool.shutdown(self.config.shutdown_timeout()).await;
        }

        let tasks: Vec<JoinHandle<()>> = self
            .background_tasks
            .lock()
            .map_err(|_| ServiceError::BackgroundTask {
                message: "Background task lock poisoned".to_string(),
            })?
            .drain(..)
            .collect();
        let task_count = tasks.len();
        let join_all = futures::future::join_all(tasks);
        if tokio::time::timeout(self.config.shutdown_timeout(), join_all)
            .await
            .is_err()
        {
            warn!("Background tasks did not stop within the shutdown timeout");
        } else {
            debug!("{} background tasks stopped", task_count);
        }

        let final_stats = self
            .lobby_manager
            .get_stats()
            .map_err(|e| ServiceError::BackgroundTask {
                message: format!("Failed to get final stats: {}", e),
            })?;
        info!("Final service statistics: {:?}", final_stats);
        info!("Shutdown completed");

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn accounts(&self) -> Arc<dyn AccountStore> {
        self.accounts.clone()
    }

    pub fn queue(&self) -> Arc<MatchmakingQueue> {
        self.queue.clone()
    }

    pub fn leaderboard(&self) -> Arc<Leaderboard> {
        self.leaderboard.clone()
    }

    pub fn lobby_manager(&self) -> Arc<LobbyManager> {
        self.lobby_manager.clone()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    /// Whether the accept loop is still taking connections
    pub fn listener_running(&self) -> bool {
        self.listener_running.load(Ordering::SeqCst)
    }

    /// Dispatch workers still servicing the queue
    pub fn dispatch_workers_alive(&self) -> usize {
        match self.dispatch_pool.lock() {
            Ok(pool) => pool.as_ref().map_or(0, DispatchPool::alive_workers),
            Err(_) => 0,
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Lobby manager statistics
    pub fn lobby_stats(&self) -> crate::error::Result<LobbyManagerStats> {
        self.lobby_manager.get_stats()
    }

    /// Shared state handed to every new session
    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            accounts: self.accounts.clone(),
            queue: self.queue.clone(),
            leaderboard: self.leaderboard.clone(),
            metrics_collector: self.metrics_collector.clone(),
            max_frame_length: self.config.protocol.max_frame_length,
            leaderboard_page_size: self.config.protocol.leaderboard_page_size,
            cancel: self.cancel.clone(),
        }
    }

    fn spawn_task<F>(&self, task: F) -> Result<(), ServiceError>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        self.background_tasks
            .lock()
            .map_err(|_| ServiceError::BackgroundTask {
                message: "Background task lock poisoned".to_string(),
            })?
            .push(handle);
        Ok(())
    }

    fn start_dispatch_pool(&self) -> Result<(), ServiceError> {
        let pool = DispatchPool::start(
            self.config.matchmaking.dispatch_workers,
            self.queue.clone(),
            self.lobby_manager.clone(),
            self.metrics_collector.clone(),
            self.cancel.child_token(),
        );
        let mut slot = self
            .dispatch_pool
            .lock()
            .map_err(|_| ServiceError::BackgroundTask {
                message: "Dispatch pool lock poisoned".to_string(),
            })?;
        *slot = Some(pool);
        Ok(())
    }

    fn start_health_server(self: &Arc<Self>) -> Result<(), ServiceError> {
        let health_config = HealthServerConfig {
            port: self.config.service.health_port,
            host: self.config.service.host.clone(),
        };
        let server = HealthServer::new(
            health_config,
            self.metrics_collector.clone(),
            self.cancel.clone(),
        )
        .with_app_state(self.clone());

        let port = self.config.service.health_port;
        self.spawn_task(async move {
            if let Err(e) = server.start().await {
                error!("Health server failed: {}", e);
            }
        })?;

        info!("Health endpoints starting on port {}", port);
        Ok(())
    }

    /// Start background maintenance tasks
    fn start_background_tasks(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting health metrics task (10s interval)...");
        let state = self.clone();
        let cancel = self.cancel.clone();

        self.spawn_task(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            debug!("Health metrics task started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = cancel.cancelled() => break,
                }

                let metrics = state.metrics_collector();
                metrics
                    .service()
                    .uptime_seconds
                    .set(state.uptime().as_secs() as i64);
                if let Ok(depth) = state.queue.len() {
                    metrics.record_queue_depth(depth);
                }

                match HealthCheck::check(state.clone()).await {
                    Ok(health) => {
                        let level = match health.status {
                            HealthStatus::Healthy => 2,
                            HealthStatus::Degraded => 1,
                            HealthStatus::Unhealthy => 0,
                        };
                        metrics.update_health_status(level);
                        for component in &health.checks {
                            metrics.update_component_health(
                                &component.name,
                                component.status != HealthStatus::Unhealthy,
                            );
                        }
                    }
                    Err(e) => warn!("Health check failed: {}", e),
                }
            }

            debug!("Health metrics task stopped");
        })
    }
}

/// Accept client connections until cancelled, one session task each
async fn accept_loop(
    listener: TcpListener,
    context: SessionContext,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    info!("Accepted connection from {}", peer);
                    let session = Session::new(stream, context.clone(), peer.to_string());
                    tokio::spawn(session.run());
                }
                Err(e) => error!("Failed to accept connection: {}", e),
            },
            _ = cancel.cancelled() => break,
        }
    }

    running.store(false, Ordering::SeqCst);
    info!("Listener stopped");
}
