//! Lobby management system for the matchmaking server
//!
//! This module handles lobby creation, the admission rule, and the
//! controller that plays each lobby's match.

pub mod controller;
pub mod instance;
pub mod manager;
pub mod matching;

// Re-export commonly used types
pub use controller::{LobbyController, MatchContext, MatchTicket};
pub use instance::{simulate_match, LobbyInstance, LobbyState};
pub use manager::{ActiveLobbies, LobbyHandle, LobbyManager, LobbyManagerStats};
pub use matching::{admits, LobbyMatcher, LobbySnapshot, MatchingResult, VarianceLobbyMatcher};
