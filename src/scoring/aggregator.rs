use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use super::models::{EventKind, ScoreEvent, TimeSeriesPoint, Window};
use crate::leaderboard::models::ParticipantStanding;

/// Configuration for the aggregator
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Sampling interval of the historical score series. Events landing in
    /// the same bucket collapse into a single point.
    pub bucket_width: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            bucket_width: Duration::from_secs(60),
        }
    }
}

/// Ordering key for the standings list: total descending, then earliest
/// last-event timestamp (first to reach a score ranks above), then
/// participant id. No two distinct participants compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RankEntry {
    total: i64,
    last_event_at: DateTime<Utc>,
    participant_id: String,
}

impl Ord for RankEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .total
            .cmp(&self.total)
            .then_with(|| self.last_event_at.cmp(&other.last_event_at))
            .then_with(|| self.participant_id.cmp(&other.participant_id))
    }
}

impl PartialOrd for RankEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
struct RunningTotal {
    total: i64,
    solves: u32,
    last_event_at: DateTime<Utc>,
}

impl RunningTotal {
    fn fold(&mut self, event: &ScoreEvent) {
        self.total += event.delta;
        self.last_event_at = self.last_event_at.max(event.timestamp);
        if event.kind == EventKind::Solve {
            self.solves += 1;
        }
    }

    fn from_event(event: &ScoreEvent) -> Self {
        Self {
            total: event.delta,
            solves: (event.kind == EventKind::Solve) as u32,
            last_event_at: event.timestamp,
        }
    }
}

/// Incremental fold of the event log into current standings and historical
/// series. Applying an event is O(1) on the running totals; only the rank
/// position of the affected participant is recomputed (binary-searched
/// remove and insert on the ordered standings list).
///
/// Pure state machine: no I/O, no locking. Callers serialize mutation.
pub struct Aggregator {
    bucket_secs: i64,
    totals: HashMap<String, RunningTotal>,
    category_totals: HashMap<String, HashMap<String, RunningTotal>>,
    ranked: Vec<RankEntry>,
    series: HashMap<String, Vec<TimeSeriesPoint>>,
    total_solves: u64,
}

impl Aggregator {
    pub fn new(config: &AggregatorConfig) -> Self {
        Self {
            bucket_secs: (config.bucket_width.as_secs() as i64).max(1),
            totals: HashMap::new(),
            category_totals: HashMap::new(),
            ranked: Vec::new(),
            series: HashMap::new(),
            total_solves: 0,
        }
    }

    /// Folds an event sequence into a fresh aggregator. Used for
    /// point-in-time reconstruction and startup hydration; the input is
    /// expected to come from the log, already validated and deduplicated.
    pub fn replay<'a, I>(config: &AggregatorConfig, events: I) -> Self
    where
        I: IntoIterator<Item = &'a ScoreEvent>,
    {
        let mut aggregator = Self::new(config);
        for event in events {
            aggregator.apply(event);
        }
        aggregator
    }

    /// Applies one validated event to the running state.
    pub fn apply(&mut self, event: &ScoreEvent) {
        let participant_id = &event.participant_id;

        let old_key = self.totals.get(participant_id).map(|t| RankEntry {
            total: t.total,
            last_event_at: t.last_event_at,
            participant_id: participant_id.clone(),
        });

        let updated = self
            .totals
            .entry(participant_id.clone())
            .and_modify(|t| t.fold(event))
            .or_insert_with(|| RunningTotal::from_event(event));

        let new_key = RankEntry {
            total: updated.total,
            last_event_at: updated.last_event_at,
            participant_id: participant_id.clone(),
        };
        let cumulative = updated.total;

        if event.kind == EventKind::Solve {
            self.total_solves += 1;
        }

        // Only this participant's position can have changed.
        if let Some(old) = old_key {
            match self.ranked.binary_search(&old) {
                Ok(index) => {
                    self.ranked.remove(index);
                }
                Err(_) => debug_assert!(false, "standing missing from rank order"),
            }
        }
        let position = self.ranked.binary_search(&new_key).unwrap_or_else(|i| i);
        self.ranked.insert(position, new_key);

        if let Some(category_id) = &event.category_id {
            self.category_totals
                .entry(participant_id.clone())
                .or_default()
                .entry(category_id.clone())
                .and_modify(|t| t.fold(event))
                .or_insert_with(|| RunningTotal::from_event(event));
        }

        let bucket = self.bucket_start(event.timestamp);
        let points = self.series.entry(participant_id.clone()).or_default();
        match points.last_mut() {
            // Bucket timestamps must strictly increase per participant, so a
            // same-bucket or clock-skewed earlier event folds into the
            // newest point.
            Some(last) if bucket <= last.timestamp => last.cumulative_score = cumulative,
            _ => points.push(TimeSeriesPoint {
                timestamp: bucket,
                cumulative_score: cumulative,
            }),
        }
    }

    /// Current standings in rank order.
    pub fn standings(&self) -> Vec<ParticipantStanding> {
        self.ranked
            .iter()
            .enumerate()
            .map(|(index, entry)| ParticipantStanding {
                participant_id: entry.participant_id.clone(),
                rank: (index + 1) as u32,
                total_score: entry.total,
                solves: self
                    .totals
                    .get(&entry.participant_id)
                    .map(|t| t.solves)
                    .unwrap_or_default(),
                last_event_at: entry.last_event_at,
            })
            .collect()
    }

    /// Standings restricted to one category, ranked by the same rule.
    /// Participants with no events in the category are absent.
    pub fn category_standings(&self, category_id: &str) -> Vec<ParticipantStanding> {
        let mut entries: Vec<(RankEntry, u32)> = self
            .category_totals
            .iter()
            .filter_map(|(participant_id, categories)| {
                categories.get(category_id).map(|t| {
                    (
                        RankEntry {
                            total: t.total,
                            last_event_at: t.last_event_at,
                            participant_id: participant_id.clone(),
                        },
                        t.solves,
                    )
                })
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        entries
            .into_iter()
            .enumerate()
            .map(|(index, (entry, solves))| ParticipantStanding {
                participant_id: entry.participant_id,
                rank: (index + 1) as u32,
                total_score: entry.total,
                solves,
                last_event_at: entry.last_event_at,
            })
            .collect()
    }

    /// Cumulative series for the requested participants, clipped to the
    /// window. Participants with no history are absent from the result.
    pub fn series_window(
        &self,
        participant_ids: &[String],
        window: Window,
        now: DateTime<Utc>,
    ) -> HashMap<String, Vec<TimeSeriesPoint>> {
        let start = window.start_from(now);
        participant_ids
            .iter()
            .filter_map(|id| {
                self.series
                    .get(id)
                    .map(|points| (id.clone(), Self::clip(points, start)))
            })
            .collect()
    }

    fn clip(points: &[TimeSeriesPoint], start: Option<DateTime<Utc>>) -> Vec<TimeSeriesPoint> {
        let Some(start) = start else {
            return points.to_vec();
        };

        let first_inside = points.partition_point(|p| p.timestamp < start);
        let mut clipped = points[first_inside..].to_vec();

        // Carry the last pre-window cumulative score forward to the window
        // edge so the series has a defined baseline instead of a gap.
        if first_inside > 0 && clipped.first().map(|p| p.timestamp > start).unwrap_or(true) {
            clipped.insert(
                0,
                TimeSeriesPoint {
                    timestamp: start,
                    cumulative_score: points[first_inside - 1].cumulative_score,
                },
            );
        }

        clipped
    }

    /// The participant's cumulative score as of `at`, per the sampled series.
    pub fn cumulative_at(&self, participant_id: &str, at: DateTime<Utc>) -> i64 {
        let Some(points) = self.series.get(participant_id) else {
            return 0;
        };
        let index = points.partition_point(|p| p.timestamp <= at);
        if index == 0 {
            0
        } else {
            points[index - 1].cumulative_score
        }
    }

    /// Score gained (or lost) since `since`, for every ranked participant.
    pub fn changes_since(&self, since: DateTime<Utc>) -> HashMap<String, i64> {
        self.ranked
            .iter()
            .map(|entry| {
                (
                    entry.participant_id.clone(),
                    entry.total - self.cumulative_at(&entry.participant_id, since),
                )
            })
            .collect()
    }

    /// Count of solve events across the whole board.
    pub fn total_solves(&self) -> u64 {
        self.total_solves
    }

    fn bucket_start(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let seconds = timestamp.timestamp();
        let start = seconds - seconds.rem_euclid(self.bucket_secs);
        Utc.timestamp_opt(start, 0).single().unwrap_or(timestamp)
    }
}
