// src/store/mod.rs
//! Durable system of record for snapshots and the processed-ID ledger.
//! Single writer (the ingestion worker); the read-only query surface sits
//! on top of the same trait.

pub mod postgres;

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshot::{SentimentSnapshot, TimeWindow};

pub use postgres::PostgresStore;

/// Durable dedup record: one row per accepted source post ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedId {
    pub source_id: String,
    pub ticker: String,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedId {
    pub fn new(source_id: impl Into<String>, ticker: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            ticker: ticker.into(),
            processed_at: Utc::now(),
        }
    }
}

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn save_snapshot(&self, snapshot: &SentimentSnapshot) -> Result<()>;

    /// Newest first.
    async fn find_recent_snapshots(
        &self,
        ticker: &str,
        time_window: TimeWindow,
        limit: i64,
    ) -> Result<Vec<SentimentSnapshot>>;

    /// Chronological (oldest first), all windows.
    async fn find_snapshots_since(
        &self,
        ticker: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SentimentSnapshot>>;

    /// Returns the number of snapshots removed.
    async fn delete_snapshots_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Idempotent: IDs already present are skipped, never an error. A
    /// duplicate-key race with another writer must not abort the batch.
    async fn insert_processed_ids(&self, batch: &[ProcessedId]) -> Result<()>;

    async fn find_processed_ids(
        &self,
        ticker: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>>;

    /// Time-based expiry of old dedup records. Returns rows removed.
    async fn expire_processed_ids(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// In-memory store backing integration tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    snapshots: Vec<SentimentSnapshot>,
    processed: HashMap<String, ProcessedId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: all stored snapshots in insertion order.
    pub fn snapshots(&self) -> Vec<SentimentSnapshot> {
        self.inner.lock().expect("memory store poisoned").snapshots.clone()
    }

    /// Test hook: number of processed-ID rows.
    pub fn processed_count(&self) -> usize {
        self.inner.lock().expect("memory store poisoned").processed.len()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn save_snapshot(&self, snapshot: &SentimentSnapshot) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        inner.snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn find_recent_snapshots(
        &self,
        ticker: &str,
        time_window: TimeWindow,
        limit: i64,
    ) -> Result<Vec<SentimentSnapshot>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let mut out: Vec<_> = inner
            .snapshots
            .iter()
            .filter(|s| s.ticker == ticker && s.time_window == time_window)
            .cloned()
            .collect();
        out.sort_by_key(|s| std::cmp::Reverse(s.timestamp));
        out.truncate(limit.max(0) as usize);
        Ok(out)
    }

    async fn find_snapshots_since(
        &self,
        ticker: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SentimentSnapshot>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let mut out: Vec<_> = inner
            .snapshots
            .iter()
            .filter(|s| s.ticker == ticker && s.timestamp >= since)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.timestamp);
        Ok(out)
    }

    async fn delete_snapshots_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let before = inner.snapshots.len();
        inner.snapshots.retain(|s| s.timestamp >= cutoff);
        Ok((before - inner.snapshots.len()) as u64)
    }

    async fn insert_processed_ids(&self, batch: &[ProcessedId]) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        for rec in batch {
            inner
                .processed
                .entry(rec.source_id.clone())
                .or_insert_with(|| rec.clone());
        }
        Ok(())
    }

    async fn find_processed_ids(
        &self,
        ticker: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner
            .processed
            .values()
            .filter(|r| r.ticker == ticker && r.processed_at >= since)
            .map(|r| r.source_id.clone())
            .collect())
    }

    async fn expire_processed_ids(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let before = inner.processed.len();
        inner.processed.retain(|_, r| r.processed_at >= cutoff);
        Ok((before - inner.processed.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_inserts_do_not_error_or_double_count() {
        let store = MemoryStore::new();
        let batch = vec![
            ProcessedId::new("reddit_1", "SPY"),
            ProcessedId::new("reddit_1", "SPY"),
            ProcessedId::new("news_2", "SPY"),
        ];
        store.insert_processed_ids(&batch).await.unwrap();
        store.insert_processed_ids(&batch).await.unwrap();
        assert_eq!(store.processed_count(), 2);
    }

    #[tokio::test]
    async fn find_processed_ids_respects_since() {
        let store = MemoryStore::new();
        let mut old = ProcessedId::new("reddit_old", "SPY");
        old.processed_at = Utc::now() - chrono::Duration::days(2);
        store
            .insert_processed_ids(&[old, ProcessedId::new("reddit_new", "SPY")])
            .await
            .unwrap();

        let since = Utc::now() - chrono::Duration::hours(24);
        let ids = store.find_processed_ids("SPY", since).await.unwrap();
        assert_eq!(ids, vec!["reddit_new".to_string()]);
    }

    #[tokio::test]
    async fn expiry_removes_old_rows() {
        let store = MemoryStore::new();
        let mut old = ProcessedId::new("reddit_old", "SPY");
        old.processed_at = Utc::now() - chrono::Duration::days(8);
        store
            .insert_processed_ids(&[old, ProcessedId::new("reddit_new", "SPY")])
            .await
            .unwrap();

        let removed = store
            .expire_processed_ids(Utc::now() - chrono::Duration::days(7))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.processed_count(), 1);
    }
}
