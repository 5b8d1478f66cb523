use thiserror::Error;

use super::models::EventKind;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("duplicate event: causality '{causality_id}' already credited to '{participant_id}'")]
    DuplicateEvent {
        participant_id: String,
        causality_id: String,
    },

    #[error("invalid delta {delta} for {kind} event")]
    InvalidDelta { kind: EventKind, delta: i64 },

    #[error("event log error: {0}")]
    Log(String),
}
