//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the arena-ladder server
//! using Prometheus metrics.

use crate::types::RatingChange;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the server
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Lobby-related metrics
    lobby_metrics: LobbyMetrics,

    /// Player-related metrics
    player_metrics: PlayerMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Connected client sessions
    pub sessions_active: IntGauge,

    /// Commands handled, by token
    pub commands_total: IntCounterVec,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Lobby-related metrics
#[derive(Clone)]
pub struct LobbyMetrics {
    /// Lobbies still admitting players or playing their match
    pub active_lobbies: IntGauge,

    /// Total lobbies created
    pub lobbies_created_total: IntCounter,

    /// Matches finished, by outcome (completed or aborted)
    pub matches_total: IntCounterVec,
}

/// Player-related metrics
#[derive(Clone)]
pub struct PlayerMetrics {
    /// Authentication attempts by kind (sign_up, sign_in) and result
    pub auth_attempts_total: IntCounterVec,

    /// Total players queued for a competitive match
    pub players_queued_total: IntCounter,

    /// Players currently waiting in the matchmaking queue
    pub queue_depth: IntGauge,

    /// Time between queueing and lobby admission
    pub queue_wait_time_seconds: Histogram,

    /// Rating change applied after rated matches
    pub rating_changes: Histogram,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Time to place one queue entry into a lobby
    pub admission_duration: Histogram,

    /// Outcome prediction time
    pub prediction_duration: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let lobby_metrics = LobbyMetrics::new(&registry)?;
        let player_metrics = PlayerMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            lobby_metrics,
            player_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn lobby(&self) -> &LobbyMetrics {
        &self.lobby_metrics
    }

    pub fn player(&self) -> &PlayerMetrics {
        &self.player_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    pub fn record_session_opened(&self) {
        self.service_metrics.sessions_active.inc();
    }

    pub fn record_session_closed(&self) {
        self.service_metrics.sessions_active.dec();
    }

    /// Record a handled command token
    pub fn record_command(&self, command: &str) {
        self.service_metrics
            .commands_total
            .with_label_values(&[command])
            .inc();
    }

    /// Record a sign-up or sign-in attempt
    pub fn record_auth_attempt(&self, kind: &str, success: bool) {
        let result = if success { "success" } else { "failed" };
        self.player_metrics
            .auth_attempts_total
            .with_label_values(&[kind, result])
            .inc();
    }

    /// Record a player entering the queue
    pub fn record_player_queued(&self, queue_depth: usize) {
        self.player_metrics.players_queued_total.inc();
        self.player_metrics.queue_depth.set(queue_depth as i64);
    }

    pub fn record_queue_depth(&self, queue_depth: usize) {
        self.player_metrics.queue_depth.set(queue_depth as i64);
    }

    /// Record a player admitted into a lobby
    pub fn record_admission(&self, waited: Duration, decision: Duration) {
        self.player_metrics
            .queue_wait_time_seconds
            .observe(waited.as_secs_f64());
        self.performance_metrics
            .admission_duration
            .observe(decision.as_secs_f64());
    }

    pub fn record_lobby_created(&self) {
        self.lobby_metrics.lobbies_created_total.inc();
        self.lobby_metrics.active_lobbies.inc();
    }

    /// Record a lobby controller finishing, whatever the outcome
    pub fn record_lobby_closed(&self) {
        self.lobby_metrics.active_lobbies.dec();
    }

    pub fn record_prediction(&self, duration: Duration) {
        self.performance_metrics
            .prediction_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a completed match and the rating changes it applied
    pub fn record_match_completed(&self, changes: &[RatingChange]) {
        self.lobby_metrics
            .matches_total
            .with_label_values(&["completed"])
            .inc();

        for change in changes {
            self.player_metrics
                .rating_changes
                .observe(change.delta() as f64);
        }
    }

    pub fn record_match_aborted(&self) {
        self.lobby_metrics
            .matches_total
            .with_label_values(&["aborted"])
            .inc();
    }

    /// Matches completed since start-up
    pub fn matches_completed(&self) -> u64 {
        self.lobby_metrics
            .matches_total
            .with_label_values(&["completed"])
            .get()
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("arena_ladder_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let sessions_active =
            IntGauge::new("arena_ladder_sessions_active", "Connected client sessions")?;
        registry.register(Box::new(sessions_active.clone()))?;

        let commands_total = IntCounterVec::new(
            Opts::new("arena_ladder_commands_total", "Commands handled"),
            &["command"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let health_status = IntGauge::new(
            "arena_ladder_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("arena_ladder_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            sessions_active,
            commands_total,
            health_status,
            component_health,
        })
    }
}

impl LobbyMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_lobbies =
            IntGauge::new("arena_ladder_active_lobbies", "Number of active lobbies")?;
        registry.register(Box::new(active_lobbies.clone()))?;

        let lobbies_created_total = IntCounter::new(
            "arena_ladder_lobbies_created_total",
            "Total lobbies created",
        )?;
        registry.register(Box::new(lobbies_created_total.clone()))?;

        let matches_total = IntCounterVec::new(
            Opts::new("arena_ladder_matches_total", "Matches finished by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(matches_total.clone()))?;

        Ok(Self {
            active_lobbies,
            lobbies_created_total,
            matches_total,
        })
    }
}

impl PlayerMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let auth_attempts_total = IntCounterVec::new(
            Opts::new(
                "arena_ladder_auth_attempts_total",
                "Authentication attempts",
            ),
            &["kind", "result"],
        )?;
        registry.register(Box::new(auth_attempts_total.clone()))?;

        let players_queued_total = IntCounter::new(
            "arena_ladder_players_queued_total",
            "Total players queued",
        )?;
        registry.register(Box::new(players_queued_total.clone()))?;

        let queue_depth = IntGauge::new(
            "arena_ladder_queue_depth",
            "Players currently waiting in the matchmaking queue",
        )?;
        registry.register(Box::new(queue_depth.clone()))?;

        let queue_wait_time_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "arena_ladder_queue_wait_time_seconds",
                "Time from queueing to lobby admission",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]),
        )?;
        registry.register(Box::new(queue_wait_time_seconds.clone()))?;

        let rating_changes = Histogram::with_opts(
            HistogramOpts::new(
                "arena_ladder_rating_changes",
                "Rating change applied after rated matches",
            )
            .buckets(vec![-32.0, -16.0, -8.0, -1.0, 0.0, 1.0, 8.0, 16.0, 32.0]),
        )?;
        registry.register(Box::new(rating_changes.clone()))?;

        Ok(Self {
            auth_attempts_total,
            players_queued_total,
            queue_depth,
            queue_wait_time_seconds,
            rating_changes,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let admission_duration = Histogram::with_opts(
            HistogramOpts::new(
                "arena_ladder_admission_duration_seconds",
                "Admission decision time",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.005, 0.01, 0.05, 0.1]),
        )?;
        registry.register(Box::new(admission_duration.clone()))?;

        let prediction_duration = Histogram::with_opts(
            HistogramOpts::new(
                "arena_ladder_prediction_duration_seconds",
                "Outcome prediction time",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.005, 0.01, 0.05, 0.1]),
        )?;
        registry.register(Box::new(prediction_duration.clone()))?;

        Ok(Self {
            admission_duration,
            prediction_duration,
        })
    }
}
