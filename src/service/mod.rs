//! Service layer for the arena-ladder matchmaking server
//!
//! This module contains the main application state, service coordination,
//! and background task management.

pub mod app;
pub mod health;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
