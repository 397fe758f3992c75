//! Metrics and monitoring for the matchmaking server
//!
//! This module provides Prometheus metrics collection and the HTTP server
//! exposing health, metrics and statistics endpoints.

pub mod collector;
pub mod health;

pub use collector::{
    LobbyMetrics, MetricsCollector, MetricsTimer, PerformanceMetrics, PlayerMetrics,
    ServiceMetrics,
};
pub use health::{HealthServer, HealthServerConfig};
