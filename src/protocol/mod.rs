//! Wire protocol between clients and the server
//!
//! Messages are newline-delimited: command tokens are bare text lines and
//! every body is a single-line JSON value.

pub mod codec;
pub mod command;
pub mod messages;

// Re-export commonly used types
pub use codec::{decode, encode, Connection, Frame};
pub use command::Command;
pub use messages::{Credentials, ErrorReply, MatchReport, PlayerSummary, PredictionSummary};
