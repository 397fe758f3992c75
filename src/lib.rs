//! Arena Ladder - competitive matchmaking server
//!
//! This crate provides a line-protocol game server that authenticates
//! players, groups queued players into rating-balanced lobbies, predicts and
//! simulates match outcomes, updates Elo ratings and serves a ranked
//! leaderboard.

pub mod config;
pub mod error;
pub mod leaderboard;
pub mod lobby;
pub mod matchmaking;
pub mod metrics;
pub mod player;
pub mod protocol;
pub mod rating;
pub mod service;
pub mod session;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use leaderboard::Leaderboard;
pub use lobby::LobbyManager;
pub use matchmaking::{DispatchPool, MatchmakingQueue};
pub use player::{AccountStore, InMemoryAccountStore, Player, PlayerHandle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
