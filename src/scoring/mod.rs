pub mod aggregator;
pub mod handlers;
pub mod log;
pub mod service;
pub mod types;

mod errors;
pub mod models;

pub use aggregator::{Aggregator, AggregatorConfig};
pub use errors::ScoringError;
pub use log::{EventLog, InMemoryEventLog, PostgresEventLog};
pub use models::{EventKind, RecordedEvent, ScoreEvent, TimeSeriesPoint, Window};
pub use service::{IngestReceipt, ScoringService, ScoringServiceBuilder};
