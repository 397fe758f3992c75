//! Player records and the account store
//!
//! Players are shared between sessions, lobbies and the leaderboard through
//! [`PlayerHandle`]; the [`AccountStore`] owns identity and credentials.

pub mod accounts;
pub mod record;

// Re-export commonly used types
pub use accounts::{AccountStore, InMemoryAccountStore};
pub use record::{Player, PlayerHandle};
