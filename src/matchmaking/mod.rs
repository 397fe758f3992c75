//! Competitive matchmaking queue and the worker pool that drains it

pub mod dispatch;
pub mod queue;

pub use dispatch::DispatchPool;
pub use queue::{MatchmakingQueue, QueueEntry};
