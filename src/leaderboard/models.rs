use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A participant's place on the board, derived entirely from the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantStanding {
    pub participant_id: String,
    pub rank: u32,
    pub total_score: i64,
    /// Number of solve events credited to the participant.
    pub solves: u32,
    pub last_event_at: DateTime<Utc>,
}

/// An immutable, versioned, fully-ordered view of all standings.
///
/// Snapshots are replaced atomically; readers always hold a complete one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u64,
    pub generated_at: DateTime<Utc>,
    pub standings: Vec<ParticipantStanding>,
}

impl Snapshot {
    /// The pre-ingestion board: version 0, no standings.
    pub fn empty() -> Self {
        Self {
            version: 0,
            generated_at: Utc::now(),
            standings: Vec::new(),
        }
    }
}
