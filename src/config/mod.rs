//! Configuration management for the arena-ladder server
//!
//! This module handles configuration loading from files and environment
//! variables, validation, and default values.

pub mod app;
pub mod lobby;
pub mod rating;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ProtocolSettings, ServiceSettings};
pub use lobby::MatchmakingSettings;
pub use rating::RatingSettings;
