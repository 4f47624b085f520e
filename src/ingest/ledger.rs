// src/ingest/ledger.rs
//! In-memory half of the deduplication ledger: per-ticker working sets of
//! already-processed source IDs, checked on every incoming post so a cycle
//! never pays a storage round trip per post.
//!
//! The durable half lives behind [`crate::store::Store`]; rehydration and
//! fire-and-forget persistence are wired in the scheduler.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};

use crate::ingest::types::Post;

/// Insertion-ordered set of source IDs. Trimming keeps the most recently
/// *added* half — insertion order, not access order. Not an LRU.
#[derive(Debug, Default)]
struct TickerSet {
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl TickerSet {
    fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Returns true if the id was new.
    fn insert(&mut self, id: String) -> bool {
        if self.seen.insert(id.clone()) {
            self.order.push_back(id);
            true
        } else {
            false
        }
    }

    fn len(&self) -> usize {
        self.seen.len()
    }

    fn keep_most_recent(&mut self, keep: usize) {
        while self.order.len() > keep {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
    }
}

#[derive(Debug)]
pub struct DedupLedger {
    sets: HashMap<String, TickerSet>,
    max_size: usize,
    sweep_interval: Duration,
    last_sweep: DateTime<Utc>,
}

impl DedupLedger {
    pub fn new(max_size: usize) -> Self {
        Self {
            sets: HashMap::new(),
            max_size,
            sweep_interval: Duration::hours(24),
            last_sweep: Utc::now(),
        }
    }

    pub fn has(&self, ticker: &str, source_id: &str) -> bool {
        self.sets
            .get(ticker)
            .map(|s| s.contains(source_id))
            .unwrap_or(false)
    }

    /// Seed a ticker's working set, used on startup with IDs rehydrated
    /// from durable storage.
    pub fn seed<I: IntoIterator<Item = String>>(&mut self, ticker: &str, ids: I) {
        let set = self.sets.entry(ticker.to_string()).or_default();
        for id in ids {
            set.insert(id);
        }
    }

    /// Filter out posts whose source ID is already known and mark the
    /// survivors as seen, in one pass. Duplicate IDs within the incoming
    /// batch are admitted once. Marking happens before scoring, so a crash
    /// mid-cycle cannot reprocess these posts after a restart.
    pub fn admit_batch(&mut self, ticker: &str, posts: Vec<Post>) -> Vec<Post> {
        let set = self.sets.entry(ticker.to_string()).or_default();
        posts
            .into_iter()
            .filter(|p| set.insert(p.source_id.clone()))
            .collect()
    }

    /// Idempotent bulk insert (used by tests and manual backfills).
    pub fn mark_batch<I: IntoIterator<Item = String>>(&mut self, ticker: &str, ids: I) {
        let set = self.sets.entry(ticker.to_string()).or_default();
        for id in ids {
            set.insert(id);
        }
    }

    pub fn len(&self, ticker: &str) -> usize {
        self.sets.get(ticker).map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, ticker: &str) -> bool {
        self.len(ticker) == 0
    }

    /// When a ticker's set has grown past the ceiling, keep only the most
    /// recently added half. Returns the kept size if a trim happened.
    pub fn trim_if_needed(&mut self, ticker: &str) -> Option<usize> {
        let set = self.sets.get_mut(ticker)?;
        if set.len() <= self.max_size {
            return None;
        }
        set.keep_most_recent(self.max_size / 2);
        let kept = set.len();
        tracing::info!(ticker, kept, "trimmed dedup cache");
        Some(kept)
    }

    /// Re-apply the trim across all tracked tickers, at most once per
    /// 24 hours of wall clock. Called at the start of each cycle.
    pub fn sweep_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if now - self.last_sweep <= self.sweep_interval {
            return false;
        }
        for (ticker, set) in self.sets.iter_mut() {
            if set.len() > self.max_size {
                set.keep_most_recent(self.max_size / 2);
                tracing::info!(ticker = ticker.as_str(), kept = set.len(), "swept dedup cache");
            }
        }
        self.last_sweep = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent_and_ordered() {
        let mut set = TickerSet::default();
        assert!(set.insert("a".into()));
        assert!(!set.insert("a".into()));
        assert!(set.insert("b".into()));
        assert_eq!(set.len(), 2);

        set.keep_most_recent(1);
        assert!(!set.contains("a"));
        assert!(set.contains("b"));
    }

    #[test]
    fn trim_keeps_most_recently_added_half() {
        let mut ledger = DedupLedger::new(100);
        ledger.mark_batch("SPY", (0..101).map(|i| format!("id{i}")));
        assert_eq!(ledger.len("SPY"), 101);

        let kept = ledger.trim_if_needed("SPY").expect("trim should fire");
        assert_eq!(kept, 50);
        // Oldest half is gone, newest survives.
        assert!(!ledger.has("SPY", "id0"));
        assert!(ledger.has("SPY", "id100"));
        assert!(ledger.has("SPY", "id51"));
        assert!(!ledger.has("SPY", "id50"));
    }

    #[test]
    fn no_trim_at_or_below_ceiling() {
        let mut ledger = DedupLedger::new(10);
        ledger.mark_batch("SPY", (0..10).map(|i| format!("id{i}")));
        assert!(ledger.trim_if_needed("SPY").is_none());
        assert_eq!(ledger.len("SPY"), 10);
    }

    #[test]
    fn sweep_gated_by_interval() {
        let mut ledger = DedupLedger::new(4);
        ledger.mark_batch("SPY", (0..9).map(|i| format!("id{i}")));

        // Not yet due.
        assert!(!ledger.sweep_if_due(Utc::now()));
        assert_eq!(ledger.len("SPY"), 9);

        // Force due by aging the last sweep.
        ledger.last_sweep = Utc::now() - Duration::hours(25);
        assert!(ledger.sweep_if_due(Utc::now()));
        assert_eq!(ledger.len("SPY"), 2);
    }
}
