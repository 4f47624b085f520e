// src/config.rs
//! Worker configuration from environment variables (a `.env` file is loaded
//! by the binary before this runs). Every knob has a default; `from_env`
//! only fails on unparsable or out-of-range values.

use std::env;
use std::str::FromStr;

use anyhow::{anyhow, ensure, Result};

use crate::snapshot::TimeWindow;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Tickers ingested each cycle, in order.
    pub tickers: Vec<String>,
    pub interval_minutes: u64,
    /// Posts scored concurrently per batch; batches run sequentially.
    pub batch_size: usize,
    /// Per-ticker ceiling of the in-memory dedup set.
    pub dedup_cache_max: usize,
    /// Per-adapter fetch deadline.
    pub fetch_timeout_secs: u64,
    /// Wall-clock hour (UTC) of the end-of-day cleanup run.
    pub eod_hour_utc: u32,
    /// Window label stamped on worker-produced snapshots.
    pub snapshot_window: TimeWindow,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tickers: vec!["SPY".to_string()],
            interval_minutes: 15,
            batch_size: 10,
            dedup_cache_max: 5000,
            fetch_timeout_secs: 10,
            eod_hour_utc: 21,
            snapshot_window: TimeWindow::FiveMin,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Ok(raw) = env::var("TICKERS") {
            let tickers: Vec<String> = raw
                .split(',')
                .map(|t| t.trim().to_uppercase())
                .filter(|t| !t.is_empty())
                .collect();
            ensure!(!tickers.is_empty(), "TICKERS is set but contains no symbols");
            cfg.tickers = tickers;
        }

        cfg.interval_minutes = parse_env("INGESTION_INTERVAL_MINUTES", cfg.interval_minutes)?;
        ensure!(cfg.interval_minutes > 0, "INGESTION_INTERVAL_MINUTES must be positive");

        cfg.batch_size = parse_env("SCORE_BATCH_SIZE", cfg.batch_size)?;
        ensure!(cfg.batch_size > 0, "SCORE_BATCH_SIZE must be positive");

        cfg.dedup_cache_max = parse_env("DEDUP_CACHE_MAX", cfg.dedup_cache_max)?;
        cfg.fetch_timeout_secs = parse_env("FETCH_TIMEOUT_SECS", cfg.fetch_timeout_secs)?;

        cfg.eod_hour_utc = parse_env("EOD_HOUR_UTC", cfg.eod_hour_utc)?;
        ensure!(cfg.eod_hour_utc <= 23, "EOD_HOUR_UTC must be in 0..=23");

        if let Ok(raw) = env::var("SNAPSHOT_WINDOW") {
            cfg.snapshot_window = TimeWindow::parse(&raw)
                .ok_or_else(|| anyhow!("SNAPSHOT_WINDOW has unknown value: {raw}"))?;
        }

        Ok(cfg)
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("parsing {key}={raw}: {e}")),
        Err(_) => Ok(default),
    }
}
