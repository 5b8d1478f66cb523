use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::models::TimeSeriesPoint;

/// Query parameters for the standings endpoint
#[derive(Debug, Deserialize)]
pub struct StandingsQuery {
    /// Category id, or "all" for the unfiltered board.
    pub category: Option<String>,
    /// Reconstruct the board as it stood at this instant.
    pub as_of: Option<DateTime<Utc>>,
}

/// One row of the standings response
#[derive(Debug, Serialize, Deserialize)]
pub struct StandingEntry {
    pub participant_id: String,
    pub display_rank: u32,
    pub total_score: i64,
    pub solves: u32,
    /// Score gained over the trailing 24 hours. Only present on the global
    /// current view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_change_24h: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StandingsResponse {
    pub version: u64,
    pub generated_at: DateTime<Utc>,
    /// Board-wide solve count. Only present on the global current view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_solves: Option<u64>,
    pub standings: Vec<StandingEntry>,
}

/// Query parameters for the series endpoint
#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    /// Comma-separated participant ids.
    pub participants: String,
    /// hour | day | all (default all).
    pub window: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SeriesResponse {
    pub window: String,
    pub series: HashMap<String, Vec<TimeSeriesPoint>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: u64,
}

/// Query parameters for the poll endpoint
#[derive(Debug, Deserialize)]
pub struct ChangedQuery {
    pub since: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChangedResponse {
    pub changed: bool,
    pub version: u64,
}
