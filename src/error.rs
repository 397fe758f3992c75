//! Error types for the matchmaking server
//!
//! Fallible operations return `anyhow::Result`; the domain failures the
//! server distinguishes are the variants of [`MatchmakingError`].

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Protocol error: {reason}")]
    ProtocolError { reason: String },

    #[error("Transport error: {message}")]
    TransportError { message: String },

    #[error("Invariant violated: {message}")]
    InvariantViolation { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// Shorthand for the error returned when a lock has been poisoned
    pub fn poisoned(what: &str) -> Self {
        MatchmakingError::InternalError {
            message: format!("Failed to acquire {} lock", what),
        }
    }
}
