use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use super::errors::ScoringError;

/// What kind of score-affecting occurrence an event records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
    /// An accepted flag submission.
    Solve,
    /// A deduction (hint cost, rule infraction). Delta must not be positive.
    Penalty,
    /// An administrative correction. Delta may have either sign.
    Adjustment,
}

/// An immutable record of a score-affecting occurrence.
///
/// Events are produced by the solve-validation collaborator and never
/// mutated after ingestion. Corrections are new compensating events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEvent {
    pub participant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    pub delta: i64,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    /// Deduplication key: at most one credit per (participant, causality).
    pub causality_id: String,
}

impl ScoreEvent {
    /// Checks the delta sign rules: a solve never subtracts points and a
    /// penalty never adds them.
    pub fn validate(&self) -> Result<(), ScoringError> {
        let valid = match self.kind {
            EventKind::Solve => self.delta >= 0,
            EventKind::Penalty => self.delta <= 0,
            EventKind::Adjustment => true,
        };

        if valid {
            Ok(())
        } else {
            Err(ScoringError::InvalidDelta {
                kind: self.kind,
                delta: self.delta,
            })
        }
    }
}

/// A score event as stored in the log, with its assigned identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Globally unique event id.
    pub id: String,
    /// Position in the log. `events_since` cursors are sequence numbers.
    pub seq: u64,
    pub event: ScoreEvent,
}

/// One sampled point of a participant's cumulative score history.
///
/// Timestamps are bucket starts; per participant they are strictly
/// increasing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub cumulative_score: i64,
}

/// Timeframe selector for series queries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Window {
    Hour,
    Day,
    All,
}

impl Window {
    /// The inclusive lower bound of the window, or `None` for the full history.
    pub fn start_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Window::Hour => Some(now - Duration::hours(1)),
            Window::Day => Some(now - Duration::hours(24)),
            Window::All => None,
        }
    }
}
