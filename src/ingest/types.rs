// src/ingest/types.rs
use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin of a post. Serialized names match the wire strings the dashboard
/// and storage layer use.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Reddit,
    Stocktwits,
    News,
    Finnhub,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Reddit,
        SourceKind::Stocktwits,
        SourceKind::News,
        SourceKind::Finnhub,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Reddit => "reddit",
            SourceKind::Stocktwits => "stocktwits",
            SourceKind::News => "news",
            SourceKind::Finnhub => "finnhub",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One post about a ticker, produced by an adapter and consumed within a
/// single ingestion cycle. Posts are never persisted individually; they are
/// folded into a snapshot and dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Globally unique per source, e.g. `reddit_1abcd2`.
    pub source_id: String,
    pub ticker: String,
    pub source: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Opaque source-specific bag (upvotes, replies, subreddit, ...).
    /// The pipeline never looks inside.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Uniform interface over the heterogeneous upstream sources.
///
/// Implementations are best-effort: transient upstream trouble (auth, rate
/// limit, network) should be handled internally where possible. The
/// scheduler treats an `Err` as an empty contribution for the cycle, so an
/// error here never blocks the other sources.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Fetch the most recent posts mentioning `ticker`, newest first,
    /// at most `limit` of them.
    async fn fetch(&self, ticker: &str, limit: usize) -> Result<Vec<Post>>;

    fn kind(&self) -> SourceKind;
}
