//! # Snapshot Aggregator
//! Pure, testable fold from `(post, sentiment)` pairs to one
//! [`SentimentSnapshot`], plus the end-of-day roll-up. No I/O here.
//!
//! Label policy: bullish/bearish require the winning class ratio to exceed
//! the other by more than 0.1 — a hysteresis band that keeps the label from
//! flapping near 50/50 splits.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::ingest::types::{Post, SourceKind};
use crate::sentiment::Sentiment;
use crate::snapshot::{
    LabelCounts, OverallSentiment, SentimentBreakdown, SentimentSnapshot, SourceStats, TimeWindow,
};

/// Fold scored posts into a single snapshot. `posts` and `sentiments` are
/// matched by index and must have the same length.
pub fn aggregate(
    ticker: &str,
    timestamp: DateTime<Utc>,
    time_window: TimeWindow,
    posts: &[Post],
    sentiments: &[Sentiment],
) -> SentimentSnapshot {
    debug_assert_eq!(posts.len(), sentiments.len());

    let mut breakdown = SentimentBreakdown::default();
    // Every source appears in the map, zeroed, so the per-source sum
    // invariant holds even when a source contributed nothing.
    let mut sources: BTreeMap<SourceKind, SourceStats> = SourceKind::ALL
        .iter()
        .map(|k| (*k, SourceStats::default()))
        .collect();
    let mut scores = Vec::with_capacity(posts.len());

    for (post, sentiment) in posts.iter().zip(sentiments.iter()) {
        let class = breakdown.class_mut(sentiment.label);
        class.count += 1;
        class.total_score += sentiment.score;

        let entry = sources.entry(post.source).or_default();
        entry.count += 1;
        entry.sentiment.bump(sentiment.label);

        scores.push(sentiment.score);
    }

    for class in [
        &mut breakdown.positive,
        &mut breakdown.negative,
        &mut breakdown.neutral,
    ] {
        if class.count > 0 {
            class.avg_score = class.total_score / class.count as f64;
        }
    }

    let total = breakdown.total_count();
    let (overall_sentiment, confidence, volatility) = if total > 0 {
        let pos_ratio = breakdown.positive.count as f64 / total as f64;
        let neg_ratio = breakdown.negative.count as f64 / total as f64;
        let neu_ratio = breakdown.neutral.count as f64 / total as f64;

        let overall = if pos_ratio > neg_ratio + 0.1 {
            OverallSentiment::Bullish
        } else if neg_ratio > pos_ratio + 0.1 {
            OverallSentiment::Bearish
        } else {
            OverallSentiment::Neutral
        };

        let confidence = pos_ratio.max(neg_ratio).max(neu_ratio);
        let volatility = if scores.len() > 1 {
            population_stddev(&scores)
        } else {
            0.0
        };

        (overall, confidence, volatility)
    } else {
        (OverallSentiment::Neutral, 0.0, 0.0)
    };

    SentimentSnapshot {
        ticker: ticker.to_string(),
        timestamp,
        time_window,
        total_posts: posts.len() as u64,
        sentiment_breakdown: breakdown,
        sources,
        overall_sentiment,
        confidence,
        volatility,
    }
}

/// End-of-day roll-up across one day's snapshots, for logging/reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub ticker: String,
    pub date: NaiveDate,
    pub total_snapshots: usize,
    pub total_posts: u64,
    pub sentiment_breakdown: LabelCounts,
    pub source_breakdown: BTreeMap<SourceKind, u64>,
    pub avg_confidence: f64,
    pub avg_volatility: f64,
}

/// Returns `None` when there is nothing to summarize.
pub fn daily_summary(
    ticker: &str,
    date: NaiveDate,
    snapshots: &[SentimentSnapshot],
) -> Option<DailySummary> {
    if snapshots.is_empty() {
        return None;
    }

    let mut total_posts = 0u64;
    let mut breakdown = LabelCounts::default();
    let mut source_breakdown: BTreeMap<SourceKind, u64> =
        SourceKind::ALL.iter().map(|k| (*k, 0)).collect();
    let mut confidence_sum = 0.0;
    let mut volatility_sum = 0.0;

    for snap in snapshots {
        total_posts += snap.total_posts;
        breakdown.positive += snap.sentiment_breakdown.positive.count;
        breakdown.negative += snap.sentiment_breakdown.negative.count;
        breakdown.neutral += snap.sentiment_breakdown.neutral.count;
        confidence_sum += snap.confidence;
        volatility_sum += snap.volatility;

        for (kind, stats) in &snap.sources {
            *source_breakdown.entry(*kind).or_default() += stats.count;
        }
    }

    let n = snapshots.len() as f64;
    Some(DailySummary {
        ticker: ticker.to_string(),
        date,
        total_snapshots: snapshots.len(),
        total_posts,
        sentiment_breakdown: breakdown,
        source_breakdown,
        avg_confidence: confidence_sum / n,
        avg_volatility: volatility_sum / n,
    })
}

/// Population standard deviation. Shared by the within-cycle volatility and
/// the cross-snapshot volatility in the query layer so the two paths cannot
/// drift apart.
pub(crate) fn population_stddev(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let variance = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::SentimentLabel;

    fn mk_post(source: SourceKind, id: &str) -> Post {
        Post {
            source_id: format!("{}_{}", source.as_str(), id),
            ticker: "SPY".into(),
            source,
            title: None,
            content: "text".into(),
            author: None,
            url: None,
            published_at: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    fn mk_sentiment(label: SentimentLabel, score: f64) -> Sentiment {
        Sentiment {
            label,
            score,
            positive: 0.0,
            negative: 0.0,
            neutral: 1.0,
        }
    }

    #[test]
    fn empty_input_short_circuits_to_neutral() {
        let snap = aggregate("SPY", Utc::now(), TimeWindow::FiveMin, &[], &[]);
        assert_eq!(snap.total_posts, 0);
        assert_eq!(snap.overall_sentiment, OverallSentiment::Neutral);
        assert_eq!(snap.confidence, 0.0);
        assert_eq!(snap.volatility, 0.0);
    }

    #[test]
    fn avg_score_guards_divide_by_zero() {
        let posts = vec![mk_post(SourceKind::Reddit, "a")];
        let sents = vec![mk_sentiment(SentimentLabel::Positive, 0.8)];
        let snap = aggregate("SPY", Utc::now(), TimeWindow::FiveMin, &posts, &sents);
        assert!((snap.sentiment_breakdown.positive.avg_score - 0.8).abs() < 1e-9);
        assert_eq!(snap.sentiment_breakdown.negative.avg_score, 0.0);
    }

    #[test]
    fn daily_summary_averages_and_sums() {
        let posts = vec![mk_post(SourceKind::Reddit, "a"), mk_post(SourceKind::News, "b")];
        let sents = vec![
            mk_sentiment(SentimentLabel::Positive, 0.9),
            mk_sentiment(SentimentLabel::Negative, 0.7),
        ];
        let s1 = aggregate("SPY", Utc::now(), TimeWindow::FiveMin, &posts, &sents);
        let s2 = aggregate("SPY", Utc::now(), TimeWindow::FiveMin, &posts, &sents);

        let date = Utc::now().date_naive();
        let summary = daily_summary("SPY", date, &[s1.clone(), s2]).unwrap();
        assert_eq!(summary.total_snapshots, 2);
        assert_eq!(summary.total_posts, 4);
        assert_eq!(summary.sentiment_breakdown.positive, 2);
        assert_eq!(summary.sentiment_breakdown.negative, 2);
        assert_eq!(summary.source_breakdown[&SourceKind::Reddit], 2);
        assert!((summary.avg_confidence - s1.confidence).abs() < 1e-9);
    }

    #[test]
    fn daily_summary_empty_is_none() {
        assert!(daily_summary("SPY", Utc::now().date_naive(), &[]).is_none());
    }

    #[test]
    fn stddev_of_constant_series_is_zero() {
        assert_eq!(population_stddev(&[0.4, 0.4, 0.4]), 0.0);
    }
}
