// src/query.rs
//! Read-side statistics over stored snapshots, exposed to the external API
//! layer. Pure reads; nothing here mutates ingestion state. All scoring
//! goes through [`SentimentSnapshot::overall_score`] so ingestion-time and
//! query-time paths can never present two different numbers for the same
//! data.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::aggregate::population_stddev;
use crate::snapshot::{OverallSentiment, SentimentSnapshot, TimeWindow};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Neutral,
}

/// Aggregated statistics over a trailing period.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentStats {
    pub ticker: String,
    pub period_hours: i64,
    pub total: u64,
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
    pub avg_score: f64,
    pub confidence: f64,
    pub volatility: f64,
    pub trend: Trend,
    pub snapshots: usize,
}

/// One point of the derived timeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub timestamp: DateTime<Utc>,
    pub overall_sentiment: OverallSentiment,
    pub overall_score: f64,
    pub confidence: f64,
    pub total_posts: u64,
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
}

pub struct SentimentQueries {
    store: Arc<dyn Store>,
}

impl SentimentQueries {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn latest_snapshot(
        &self,
        ticker: &str,
        time_window: TimeWindow,
    ) -> Result<Option<SentimentSnapshot>> {
        let mut found = self
            .store
            .find_recent_snapshots(&ticker.to_uppercase(), time_window, 1)
            .await?;
        Ok(found.pop())
    }

    /// Newest first.
    pub async fn recent_snapshots(
        &self,
        ticker: &str,
        time_window: TimeWindow,
        limit: i64,
    ) -> Result<Vec<SentimentSnapshot>> {
        self.store
            .find_recent_snapshots(&ticker.to_uppercase(), time_window, limit)
            .await
    }

    pub async fn stats(&self, ticker: &str, hours: i64) -> Result<SentimentStats> {
        let ticker = ticker.to_uppercase();
        let since = Utc::now() - Duration::hours(hours);
        let snapshots = self.store.find_snapshots_since(&ticker, since).await?;

        if snapshots.is_empty() {
            return Ok(SentimentStats {
                ticker,
                period_hours: hours,
                total: 0,
                positive: 0,
                negative: 0,
                neutral: 0,
                avg_score: 0.5,
                confidence: 0.0,
                volatility: 0.0,
                trend: Trend::Neutral,
                snapshots: 0,
            });
        }

        let mut total = 0u64;
        let mut positive = 0u64;
        let mut negative = 0u64;
        let mut neutral = 0u64;
        let mut confidence_sum = 0.0;
        let scores: Vec<f64> = snapshots.iter().map(|s| s.overall_score()).collect();

        for snap in &snapshots {
            total += snap.total_posts;
            positive += snap.sentiment_breakdown.positive.count;
            negative += snap.sentiment_breakdown.negative.count;
            neutral += snap.sentiment_breakdown.neutral.count;
            confidence_sum += snap.confidence;
        }

        Ok(SentimentStats {
            ticker,
            period_hours: hours,
            total,
            positive,
            negative,
            neutral,
            avg_score: mean(&scores),
            confidence: confidence_sum / snapshots.len() as f64,
            volatility: population_stddev(&scores),
            trend: trend_of(&scores),
            snapshots: snapshots.len(),
        })
    }

    /// Chronological timeline derived from stored snapshots.
    pub async fn timeline(&self, ticker: &str, hours: i64) -> Result<Vec<TimelinePoint>> {
        let since = Utc::now() - Duration::hours(hours);
        let snapshots = self
            .store
            .find_snapshots_since(&ticker.to_uppercase(), since)
            .await?;

        Ok(snapshots
            .into_iter()
            .map(|s| TimelinePoint {
                timestamp: s.timestamp,
                overall_sentiment: s.overall_sentiment,
                overall_score: s.overall_score(),
                confidence: s.confidence,
                total_posts: s.total_posts,
                positive: s.sentiment_breakdown.positive.count,
                negative: s.sentiment_breakdown.negative.count,
                neutral: s.sentiment_breakdown.neutral.count,
            })
            .collect())
    }
}

/// First-half vs second-half mean over chronologically ordered scores, with
/// the same ±0.1 band the aggregator uses for its label.
fn trend_of(scores: &[f64]) -> Trend {
    if scores.len() < 2 {
        return Trend::Neutral;
    }
    let mid = scores.len() / 2;
    let older = mean(&scores[..mid]);
    let recent = mean(&scores[mid..]);
    if recent > older + 0.1 {
        Trend::Improving
    } else if recent < older - 0.1 {
        Trend::Declining
    } else {
        Trend::Neutral
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}
