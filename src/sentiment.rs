use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

/// Scored sentiment for one piece of text. `score` is the magnitude of the
/// normalized compound in `[0, 1]`; `positive`/`negative`/`neutral` are the
/// class shares of the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub score: f64,
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

impl Sentiment {
    /// Fallback used whenever scoring cannot produce a meaningful result.
    /// The aggregator has no failure path for a missing sentiment, so
    /// scorers return this instead of an error.
    pub fn neutral_default() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            score: 0.5,
            positive: 0.33,
            negative: 0.33,
            neutral: 0.34,
        }
    }
}

/// Pure text -> sentiment boundary. Infallible by contract: implementations
/// must degrade to [`Sentiment::neutral_default`] on internal failure.
#[async_trait::async_trait]
pub trait SentimentScorer: Send + Sync {
    async fn score(&self, text: &str) -> Sentiment;
}

/// Lexicon-based scorer with finance vocabulary and negation handling.
#[derive(Debug, Clone, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Negation: if a negator appears within the previous 1..=3 tokens,
    /// the sign of that word's lexicon score is inverted.
    pub fn score_text(&self, text: &str) -> Sentiment {
        let tokens: Vec<String> = tokenize(text).collect();
        if tokens.is_empty() {
            return Sentiment::neutral_default();
        }

        let mut raw: i32 = 0;
        let mut pos_hits = 0usize;
        let mut neg_hits = 0usize;

        for i in 0..tokens.len() {
            let base = self.word_score(tokens[i].as_str());
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            let adj = if negated { -base } else { base };
            raw += adj;
            if adj > 0 {
                pos_hits += 1;
            } else {
                neg_hits += 1;
            }
        }

        // Squash the raw lexicon sum into [-1, 1].
        let compound = raw as f64 / ((raw as f64).powi(2) + 15.0).sqrt();

        let label = if compound >= 0.05 {
            SentimentLabel::Positive
        } else if compound <= -0.05 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };

        let n = tokens.len() as f64;
        let positive = pos_hits as f64 / n;
        let negative = neg_hits as f64 / n;
        let neutral = (1.0 - positive - negative).max(0.0);

        Sentiment {
            label,
            score: compound.abs(),
            positive,
            negative,
            neutral,
        }
    }
}

#[async_trait::async_trait]
impl SentimentScorer for LexiconScorer {
    async fn score(&self, text: &str) -> Sentiment {
        self.score_text(text)
    }
}

/// Alphanumeric tokens, lower-cased.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "without"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_scores_neutral_default() {
        let s = LexiconScorer::new().score_text("   ");
        assert_eq!(s, Sentiment::neutral_default());
    }

    #[test]
    fn bullish_text_scores_positive() {
        let s = LexiconScorer::new().score_text("SPY breakout, bullish momentum and strong gains");
        assert_eq!(s.label, SentimentLabel::Positive);
        assert!(s.score > 0.0 && s.score <= 1.0);
        assert!(s.positive > s.negative);
    }

    #[test]
    fn bearish_text_scores_negative() {
        let s = LexiconScorer::new().score_text("market crash incoming, panic selloff everywhere");
        assert_eq!(s.label, SentimentLabel::Negative);
        assert!(s.negative > s.positive);
    }

    #[test]
    fn negation_flips_direction() {
        let scorer = LexiconScorer::new();
        let plain = scorer.score_text("the outlook is strong");
        let negated = scorer.score_text("the outlook is not strong");
        assert_eq!(plain.label, SentimentLabel::Positive);
        assert_eq!(negated.label, SentimentLabel::Negative);
    }

    #[test]
    fn plain_prose_stays_neutral() {
        let s = LexiconScorer::new().score_text("the committee will meet on thursday");
        assert_eq!(s.label, SentimentLabel::Neutral);
    }

    #[test]
    fn class_shares_sum_to_one() {
        let s = LexiconScorer::new().score_text("strong rally but bearish fear remains");
        let sum = s.positive + s.negative + s.neutral;
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
