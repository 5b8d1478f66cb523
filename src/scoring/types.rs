use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::EventKind;

/// Request payload for recording a score event
#[derive(Debug, Deserialize)]
pub struct SubmitEventRequest {
    pub participant_id: String,
    #[serde(default)]
    pub category_id: Option<String>,
    pub delta: i64,
    /// Producers may omit the timestamp; ingestion time is used instead.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub kind: EventKind,
    pub causality_id: String,
}

/// Response for a recorded score event
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitEventResponse {
    pub event_id: String,
    /// Snapshot version that reflects this event.
    pub version: u64,
}
