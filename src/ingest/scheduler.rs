// src/ingest/scheduler.rs
//! Cycle orchestration: fetch -> dedupe -> score -> aggregate -> persist on
//! a fixed cadence, with a re-entrancy latch and end-of-day retention
//! cleanup. Collaborators (adapters, scorer, store) are injected; the
//! worker owns all mutable pipeline state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::join_all;
use metrics::{counter, gauge, histogram};
use tokio::time::{interval, sleep, timeout, Duration};

use crate::aggregate::{aggregate, daily_summary};
use crate::config::WorkerConfig;
use crate::ingest::ledger::DedupLedger;
use crate::ingest::sources::default_limit;
use crate::ingest::types::{Post, SourceAdapter};
use crate::sentiment::{Sentiment, SentimentScorer};
use crate::store::{ProcessedId, Store};

/// What one ticker's cycle did, for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub ticker: String,
    pub fetched: usize,
    pub new_posts: usize,
    pub snapshot_written: bool,
}

pub struct IngestionWorker {
    cfg: WorkerConfig,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    scorer: Arc<dyn SentimentScorer>,
    store: Arc<dyn Store>,
    ledger: Mutex<DedupLedger>,
    // Whole-scheduler latch: at most one cycle at a time, overlapping
    // triggers are dropped, not queued.
    running: AtomicBool,
}

impl IngestionWorker {
    pub fn new(
        cfg: WorkerConfig,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        scorer: Arc<dyn SentimentScorer>,
        store: Arc<dyn Store>,
    ) -> Self {
        let ledger = DedupLedger::new(cfg.dedup_cache_max);
        Self {
            cfg,
            adapters,
            scorer,
            store,
            ledger: Mutex::new(ledger),
            running: AtomicBool::new(false),
        }
    }

    /// Rehydrate the in-memory dedup sets with IDs processed in the last
    /// 24 hours, bridging process restarts without re-scoring recent
    /// duplicates. Storage trouble degrades to an empty set.
    pub async fn initialize(&self) {
        let since = Utc::now() - ChronoDuration::hours(24);
        for ticker in &self.cfg.tickers {
            match self.store.find_processed_ids(ticker, since).await {
                Ok(ids) => {
                    tracing::info!(ticker = ticker.as_str(), loaded = ids.len(), "rehydrated dedup ledger");
                    self.ledger_lock().seed(ticker, ids);
                }
                Err(e) => {
                    tracing::error!(ticker = ticker.as_str(), error = ?e, "failed to load processed ids, starting empty");
                    self.ledger_lock().seed(ticker, Vec::new());
                }
            }
        }
    }

    /// Run one full cycle across all configured tickers. Returns the
    /// per-ticker reports, or `None` if another cycle was still running
    /// (the trigger is dropped, not queued).
    pub async fn run_cycle(&self) -> Option<Vec<CycleReport>> {
        crate::ingest::ensure_metrics_described();

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::info!("ingestion already running, skipping tick");
            counter!("ingest_cycles_skipped_total").increment(1);
            return None;
        }

        let t0 = std::time::Instant::now();
        self.ledger_lock().sweep_if_due(Utc::now());

        let mut reports = Vec::with_capacity(self.cfg.tickers.len());
        for ticker in &self.cfg.tickers {
            match self.ingest_ticker(ticker).await {
                Ok(report) => {
                    tracing::info!(
                        ticker = ticker.as_str(),
                        fetched = report.fetched,
                        new_posts = report.new_posts,
                        snapshot = report.snapshot_written,
                        "cycle finished"
                    );
                    reports.push(report);
                }
                Err(e) => {
                    // This cycle's output for the ticker is lost; the next
                    // cycle proceeds independently.
                    tracing::error!(ticker = ticker.as_str(), error = ?e, "cycle failed");
                }
            }
        }

        counter!("ingest_cycles_total").increment(1);
        gauge!("ingest_last_run_ts").set(Utc::now().timestamp() as f64);
        histogram!("ingest_cycle_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        self.running.store(false, Ordering::SeqCst);
        Some(reports)
    }

    async fn ingest_ticker(&self, ticker: &str) -> Result<CycleReport> {
        // 1+2) Fetch from every adapter concurrently; each call is
        // independently fault-tolerant and time-bounded.
        let fetch_timeout = Duration::from_secs(self.cfg.fetch_timeout_secs);
        let fetches = self.adapters.iter().map(|adapter| {
            let adapter = Arc::clone(adapter);
            let limit = default_limit(adapter.kind());
            async move {
                match timeout(fetch_timeout, adapter.fetch(ticker, limit)).await {
                    Ok(Ok(posts)) => posts,
                    Ok(Err(e)) => {
                        tracing::warn!(source = %adapter.kind(), error = ?e, "source fetch failed");
                        counter!("ingest_provider_errors_total").increment(1);
                        Vec::new()
                    }
                    Err(_) => {
                        tracing::warn!(source = %adapter.kind(), "source fetch timed out");
                        counter!("ingest_provider_errors_total").increment(1);
                        Vec::new()
                    }
                }
            }
        });
        let all_posts: Vec<Post> = join_all(fetches).await.into_iter().flatten().collect();
        let fetched = all_posts.len();

        // 3+5) Drop already-seen IDs and mark the survivors before any
        // scoring happens (at-most-once over at-least-once).
        let new_posts = {
            let mut ledger = self.ledger_lock();
            let new_posts = ledger.admit_batch(ticker, all_posts);
            ledger.trim_if_needed(ticker);
            new_posts
        };
        counter!("ingest_dedup_total").increment((fetched - new_posts.len()) as u64);

        // 4) An empty cycle is not an error and writes nothing.
        if new_posts.is_empty() {
            return Ok(CycleReport {
                ticker: ticker.to_string(),
                fetched,
                new_posts: 0,
                snapshot_written: false,
            });
        }

        // 6) Fixed-size batches: concurrent within a batch, sequential
        // across batches, so peak outstanding scoring work is bounded.
        let mut sentiments: Vec<Sentiment> = Vec::with_capacity(new_posts.len());
        for batch in new_posts.chunks(self.cfg.batch_size.max(1)) {
            let scored = join_all(batch.iter().map(|p| self.scorer.score(&p.content))).await;
            sentiments.extend(scored);
        }
        counter!("ingest_scored_total").increment(sentiments.len() as u64);

        // 7+8) One snapshot per cycle; its write is the only fatal step.
        let snapshot = aggregate(
            ticker,
            Utc::now(),
            self.cfg.snapshot_window,
            &new_posts,
            &sentiments,
        );
        if let Err(e) = self.store.save_snapshot(&snapshot).await {
            counter!("ingest_snapshot_errors_total").increment(1);
            return Err(e).context("persisting snapshot");
        }

        // Durable dedup IDs are fire-and-forget: the in-memory ledger is
        // authoritative for this process, only post-restart recall degrades
        // if this write is lost.
        let ids: Vec<ProcessedId> = new_posts
            .iter()
            .map(|p| ProcessedId::new(p.source_id.clone(), ticker))
            .collect();
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.insert_processed_ids(&ids).await {
                tracing::warn!(error = ?e, "failed to persist processed ids");
            }
        });

        Ok(CycleReport {
            ticker: ticker.to_string(),
            fetched,
            new_posts: new_posts.len(),
            snapshot_written: true,
        })
    }

    /// Fixed-interval loop. The first tick fires immediately, so process
    /// start doubles as the initial run.
    pub async fn run_scheduled(self: Arc<Self>) {
        let mut ticker = interval(Duration::from_secs(self.cfg.interval_minutes * 60));
        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// Daily loop firing at the configured UTC hour.
    pub async fn run_end_of_day(self: Arc<Self>) {
        loop {
            let wait = until_next_utc_hour(Utc::now(), self.cfg.eod_hour_utc);
            sleep(wait).await;
            self.end_of_trading_day().await;
        }
    }

    /// End-of-day task: daily roll-up for reporting, then retention
    /// cleanup. Snapshots are kept for 24 hours; processed IDs for 7 days.
    pub async fn end_of_trading_day(&self) {
        tracing::info!("end-of-day cleanup starting");
        let now = Utc::now();
        let start_of_day = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is valid")
            .and_utc();

        for ticker in &self.cfg.tickers {
            match self.store.find_snapshots_since(ticker, start_of_day).await {
                Ok(snapshots) => {
                    match daily_summary(ticker, now.date_naive(), &snapshots) {
                        Some(summary) => {
                            let json = serde_json::to_string(&summary).unwrap_or_default();
                            tracing::info!(ticker = ticker.as_str(), summary = %json, "daily summary");
                        }
                        None => {
                            tracing::info!(ticker = ticker.as_str(), "no data to summarize today");
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(ticker = ticker.as_str(), error = ?e, "failed reading today's snapshots");
                }
            }
        }

        match self
            .store
            .delete_snapshots_before(now - ChronoDuration::hours(24))
            .await
        {
            Ok(n) => tracing::info!(deleted = n, "cleaned up old snapshots"),
            Err(e) => tracing::error!(error = ?e, "snapshot cleanup failed"),
        }

        match self
            .store
            .expire_processed_ids(now - ChronoDuration::days(7))
            .await
        {
            Ok(n) => tracing::info!(expired = n, "expired old processed ids"),
            Err(e) => tracing::error!(error = ?e, "processed id expiry failed"),
        }
    }

    fn ledger_lock(&self) -> std::sync::MutexGuard<'_, DedupLedger> {
        self.ledger.lock().expect("dedup ledger mutex poisoned")
    }
}

fn until_next_utc_hour(now: DateTime<Utc>, hour: u32) -> Duration {
    let mut target = now
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .expect("eod hour validated in config")
        .and_utc();
    if target <= now {
        target += ChronoDuration::days(1);
    }
    (target - now).to_std().unwrap_or(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn next_eod_is_today_when_still_ahead() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap();
        let wait = until_next_utc_hour(now, 21);
        assert_eq!(wait, Duration::from_secs(6 * 3600));
    }

    #[test]
    fn next_eod_rolls_to_tomorrow_when_past() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 22, 0, 0).unwrap();
        let wait = until_next_utc_hour(now, 21);
        assert_eq!(wait, Duration::from_secs(23 * 3600));
    }
}
