pub mod handlers;
pub mod models;
pub mod store;
pub mod types;

pub use models::{ParticipantStanding, Snapshot};
pub use store::LeaderboardStore;
