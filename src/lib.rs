// src/lib.rs
// Public library surface for the worker binary, integration tests, and the
// external HTTP API layer (which consumes the query accessors).

pub mod aggregate;
pub mod config;
pub mod ingest;
pub mod query;
pub mod sentiment;
pub mod snapshot;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::config::WorkerConfig;
pub use crate::ingest::scheduler::{CycleReport, IngestionWorker};
pub use crate::ingest::types::{Post, SourceAdapter, SourceKind};
pub use crate::query::SentimentQueries;
pub use crate::sentiment::{LexiconScorer, Sentiment, SentimentLabel, SentimentScorer};
pub use crate::snapshot::{OverallSentiment, SentimentSnapshot, TimeWindow};
pub use crate::store::{MemoryStore, PostgresStore, ProcessedId, Store};
