// tests/aggregate_snapshot.rs
use chrono::Utc;
use ticker_sentiment_worker::aggregate::aggregate;
use ticker_sentiment_worker::ingest::types::{Post, SourceKind};
use ticker_sentiment_worker::sentiment::{Sentiment, SentimentLabel};
use ticker_sentiment_worker::snapshot::{OverallSentiment, TimeWindow};

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

fn batch(
    spec: &[(SourceKind, SentimentLabel, f64)],
) -> (Vec<Post>, Vec<Sentiment>) {
    let posts = spec
        .iter()
        .enumerate()
        .map(|(i, (source, _, _))| mk_post(*source, &i.to_string()))
        .collect();
    let sentiments = spec
        .iter()
        .map(|(_, label, score)| mk_sentiment(*label, *score))
        .collect();
    (posts, sentiments)
}

#[test]
fn count_invariant_holds() {
    let (posts, sentiments) = batch(&[
        (SourceKind::Reddit, SentimentLabel::Positive, 0.9),
        (SourceKind::Reddit, SentimentLabel::Negative, 0.4),
        (SourceKind::Stocktwits, SentimentLabel::Neutral, 0.1),
        (SourceKind::News, SentimentLabel::Positive, 0.7),
    ]);
    let snap = aggregate("SPY", Utc::now(), TimeWindow::FiveMin, &posts, &sentiments);

    assert_eq!(snap.total_posts, 4);
    assert_eq!(snap.sentiment_breakdown.total_count(), snap.total_posts);
    let source_sum: u64 = snap.sources.values().map(|s| s.count).sum();
    assert_eq!(source_sum, snap.total_posts);
    // Sources that contributed nothing are present and zeroed.
    assert_eq!(snap.sources[&SourceKind::Finnhub].count, 0);
}

#[test]
fn label_hysteresis_requires_strict_margin() {
    // 11 positive vs 9 negative of 20: ratios 0.55 / 0.45, diff exactly
    // 0.1 — inside the band, so the label stays neutral.
    let mut spec = Vec::new();
    for _ in 0..11 {
        spec.push((SourceKind::Reddit, SentimentLabel::Positive, 0.8));
    }
    for _ in 0..9 {
        spec.push((SourceKind::Reddit, SentimentLabel::Negative, 0.8));
    }
    let (posts, sentiments) = batch(&spec);
    let snap = aggregate("SPY", Utc::now(), TimeWindow::FiveMin, &posts, &sentiments);
    assert_eq!(snap.overall_sentiment, OverallSentiment::Neutral);
}

#[test]
fn confidence_is_the_dominant_class_ratio() {
    let (posts, sentiments) = batch(&[
        (SourceKind::Reddit, SentimentLabel::Neutral, 0.1),
        (SourceKind::Reddit, SentimentLabel::Neutral, 0.2),
        (SourceKind::News, SentimentLabel::Neutral, 0.1),
        (SourceKind::News, SentimentLabel::Positive, 0.9),
    ]);
    let snap = aggregate("SPY", Utc::now(), TimeWindow::FiveMin, &posts, &sentiments);
    assert!((snap.confidence - 0.75).abs() < 1e-9);
    assert!((0.0..=1.0).contains(&snap.confidence));
}

#[test]
fn single_post_has_zero_volatility() {
    let (posts, sentiments) = batch(&[(SourceKind::News, SentimentLabel::Positive, 0.9)]);
    let snap = aggregate("SPY", Utc::now(), TimeWindow::FiveMin, &posts, &sentiments);
    assert_eq!(snap.volatility, 0.0);
}

#[test]
fn mixed_batch_goes_bullish() {
    // 3 positive @ 0.9, 2 negative @ 0.8: posRatio 0.6 vs negRatio 0.4,
    // margin 0.2 > 0.1.
    let (posts, sentiments) = batch(&[
        (SourceKind::Reddit, SentimentLabel::Positive, 0.9),
        (SourceKind::Reddit, SentimentLabel::Positive, 0.9),
        (SourceKind::Stocktwits, SentimentLabel::Positive, 0.9),
        (SourceKind::News, SentimentLabel::Negative, 0.8),
        (SourceKind::News, SentimentLabel::Negative, 0.8),
    ]);
    let snap = aggregate("SPY", Utc::now(), TimeWindow::FiveMin, &posts, &sentiments);

    assert_eq!(snap.total_posts, 5);
    assert_eq!(snap.overall_sentiment, OverallSentiment::Bullish);
    assert!((snap.confidence - 0.6).abs() < 1e-9);

    // Population stddev of [0.9, 0.9, 0.9, 0.8, 0.8].
    assert!((snap.volatility - 0.048989794855663564).abs() < 1e-9);

    assert!((snap.sentiment_breakdown.positive.avg_score - 0.9).abs() < 1e-9);
    assert!((snap.sentiment_breakdown.negative.total_score - 1.6).abs() < 1e-9);
    assert_eq!(snap.sources[&SourceKind::News].sentiment.negative, 2);
}
