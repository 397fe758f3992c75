//! Health check endpoints and monitoring
//!
//! This module provides health check functionality for the matchmaking
//! server, including readiness and liveness probes.

use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Combine two statuses, keeping the worse one
    fn worst(self, other: HealthStatus) -> HealthStatus {
        match (self, other) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub registered_players: usize,
    /// Players holding a leaderboard rank
    pub ranked_players: usize,
    pub queue_depth: usize,
    pub active_lobbies: usize,
    pub matches_completed: u64,
    pub matches_aborted: u64,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let checks = vec![
            Self::check_service_running(&app_state).await,
            Self::check_listener(&app_state),
            Self::check_dispatch_pool(&app_state),
            Self::check_lobby_manager(&app_state),
        ];
        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |status, check| status.worst(check.status));

        Ok(HealthCheck {
            status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats: Self::gather_service_stats(&app_state),
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify the server can take and match players
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_listener(&app_state)
            .status
            .worst(Self::check_dispatch_pool(&app_state).status))
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
        }
    }

    /// The accept loop must be taking connections
    fn check_listener(app_state: &AppState) -> ComponentCheck {
        let (status, message) = if app_state.listener_running() {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Listener is not accepting connections".to_string()),
            )
        };

        ComponentCheck {
            name: "listener".to_string(),
            status,
            message,
        }
    }

    /// All dispatch workers alive is healthy, some is degraded, none is down
    fn check_dispatch_pool(app_state: &AppState) -> ComponentCheck {
        let configured = app_state.config().matchmaking.dispatch_workers;
        let alive = app_state.dispatch_workers_alive();

        let (status, message) = if alive == 0 {
            (
                HealthStatus::Unhealthy,
                Some("No dispatch workers running".to_string()),
            )
        } else if alive < configured {
            (
                HealthStatus::Degraded,
                Some(format!("{} of {} dispatch workers running", alive, configured)),
            )
        } else {
            (HealthStatus::Healthy, None)
        };

        ComponentCheck {
            name: "dispatch_pool".to_string(),
            status,
            message,
        }
    }

    fn check_lobby_manager(app_state: &AppState) -> ComponentCheck {
        let (status, message) = match app_state.lobby_stats() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Lobby manager stats check failed: {}", e);
                (
                    HealthStatus::Degraded,
                    Some(format!("Stats check failed: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "lobby_manager".to_string(),
            status,
            message,
        }
    }

    /// Gather current service statistics
    fn gather_service_stats(app_state: &AppState) -> ServiceStats {
        let mut stats = ServiceStats {
            uptime_seconds: app_state.uptime().as_secs(),
            ..ServiceStats::default()
        };

        match app_state.accounts().player_count() {
            Ok(count) => stats.registered_players = count,
            Err(e) => debug!("Failed to count players for health check: {}", e),
        }
        match app_state.leaderboard().len() {
            Ok(len) => stats.ranked_players = len,
            Err(e) => debug!("Failed to read leaderboard for health check: {}", e),
        }
        match app_state.queue().len() {
            Ok(depth) => stats.queue_depth = depth,
            Err(e) => debug!("Failed to read queue for health check: {}", e),
        }
        match app_state.lobby_stats() {
            Ok(lobby_stats) => {
                stats.active_lobbies = lobby_stats.active_lobbies;
                stats.matches_completed = lobby_stats.matches_completed;
                stats.matches_aborted = lobby_stats.matches_aborted;
            }
            Err(e) => debug!("Failed to get lobby stats for health check: {}", e),
        }

        stats
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
