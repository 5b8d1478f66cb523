// Library crate for the flagboard scoring service
// This file exposes the public API for integration tests

pub mod leaderboard;
pub mod scoring;
pub mod shared;

// Re-export commonly used types for easier access in tests
pub use leaderboard::{LeaderboardStore, ParticipantStanding, Snapshot};
pub use scoring::{
    AggregatorConfig, EventKind, EventLog, InMemoryEventLog, ScoreEvent, ScoringError,
    ScoringService, Window,
};
pub use shared::{build_router, AppError, AppState};
