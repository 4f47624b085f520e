//! Snapshot data model: one aggregated sentiment summary for a ticker over
//! a fixed time window. Immutable after creation; the worker writes exactly
//! one per non-empty cycle.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::types::SourceKind;
use crate::sentiment::SentimentLabel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeWindow {
    #[serde(rename = "5min")]
    FiveMin,
    #[serde(rename = "15min")]
    FifteenMin,
    #[serde(rename = "1hour")]
    OneHour,
    #[serde(rename = "1day")]
    OneDay,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::FiveMin => "5min",
            TimeWindow::FifteenMin => "15min",
            TimeWindow::OneHour => "1hour",
            TimeWindow::OneDay => "1day",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "5min" => Some(TimeWindow::FiveMin),
            "15min" => Some(TimeWindow::FifteenMin),
            "1hour" => Some(TimeWindow::OneHour),
            "1day" => Some(TimeWindow::OneDay),
            _ => None,
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallSentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl OverallSentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallSentiment::Bullish => "bullish",
            OverallSentiment::Bearish => "bearish",
            OverallSentiment::Neutral => "neutral",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bullish" => Some(OverallSentiment::Bullish),
            "bearish" => Some(OverallSentiment::Bearish),
            "neutral" => Some(OverallSentiment::Neutral),
            _ => None,
        }
    }
}

/// Per-class accumulation within one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStats {
    pub count: u64,
    pub avg_score: f64,
    pub total_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentBreakdown {
    pub positive: ClassStats,
    pub negative: ClassStats,
    pub neutral: ClassStats,
}

impl SentimentBreakdown {
    pub fn class_mut(&mut self, label: SentimentLabel) -> &mut ClassStats {
        match label {
            SentimentLabel::Positive => &mut self.positive,
            SentimentLabel::Negative => &mut self.negative,
            SentimentLabel::Neutral => &mut self.neutral,
        }
    }

    pub fn total_count(&self) -> u64 {
        self.positive.count + self.negative.count + self.neutral.count
    }
}

/// Per-label post counts (no scores), used for the per-source breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
}

impl LabelCounts {
    pub fn bump(&mut self, label: SentimentLabel) {
        match label {
            SentimentLabel::Positive => self.positive += 1,
            SentimentLabel::Negative => self.negative += 1,
            SentimentLabel::Neutral => self.neutral += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.positive + self.negative + self.neutral
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    pub count: u64,
    pub sentiment: LabelCounts,
}

/// One aggregated sentiment summary.
///
/// Invariant: `sentiment_breakdown.total_count() == total_posts` and the
/// per-source counts sum to `total_posts` as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentSnapshot {
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub time_window: TimeWindow,
    pub total_posts: u64,
    pub sentiment_breakdown: SentimentBreakdown,
    pub sources: BTreeMap<SourceKind, SourceStats>,
    pub overall_sentiment: OverallSentiment,
    pub confidence: f64,
    pub volatility: f64,
}

impl SentimentSnapshot {
    /// Single display score shared by the ingestion-time and query-time
    /// paths: positive share minus negative share, rebased onto `[0, 1]`
    /// with `0.5` as the neutral baseline.
    pub fn overall_score(&self) -> f64 {
        let total = self.sentiment_breakdown.total_count();
        if total == 0 {
            return 0.5;
        }
        let pos = self.sentiment_breakdown.positive.count as f64 / total as f64;
        let neg = self.sentiment_breakdown.negative.count as f64 / total as f64;
        pos - neg + 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_snapshot() -> SentimentSnapshot {
        SentimentSnapshot {
            ticker: "SPY".into(),
            timestamp: Utc::now(),
            time_window: TimeWindow::FiveMin,
            total_posts: 0,
            sentiment_breakdown: SentimentBreakdown::default(),
            sources: BTreeMap::new(),
            overall_sentiment: OverallSentiment::Neutral,
            confidence: 0.0,
            volatility: 0.0,
        }
    }

    #[test]
    fn overall_score_neutral_baseline_when_empty() {
        assert_eq!(empty_snapshot().overall_score(), 0.5);
    }

    #[test]
    fn overall_score_reflects_class_balance() {
        let mut s = empty_snapshot();
        s.sentiment_breakdown.positive.count = 3;
        s.sentiment_breakdown.negative.count = 1;
        s.sentiment_breakdown.neutral.count = 1;
        s.total_posts = 5;
        // 0.6 - 0.2 + 0.5
        assert!((s.overall_score() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn time_window_round_trips_through_text() {
        for w in [
            TimeWindow::FiveMin,
            TimeWindow::FifteenMin,
            TimeWindow::OneHour,
            TimeWindow::OneDay,
        ] {
            assert_eq!(TimeWindow::parse(w.as_str()), Some(w));
        }
        assert_eq!(TimeWindow::parse("2min"), None);
    }
}
