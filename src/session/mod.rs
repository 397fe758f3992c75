//! Client sessions
//!
//! One session runs per connection. It authenticates the client, dispatches
//! its commands and waits on the lobby controller while a match is played.

pub mod handler;

pub use handler::{Session, SessionContext};
