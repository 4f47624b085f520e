// src/ingest/sources/finnhub.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;

use crate::ingest::normalize_text;
use crate::ingest::types::{Post, SourceAdapter, SourceKind};

#[derive(Debug, Deserialize)]
struct Article {
    id: i64,
    datetime: i64,
    #[serde(default)]
    headline: String,
    #[serde(default)]
    summary: String,
    source: Option<String>,
    url: Option<String>,
    category: Option<String>,
}

/// Company-news articles from Finnhub. Requires an API key; without one the
/// adapter logs once per cycle and contributes nothing.
pub struct FinnhubAdapter {
    client: reqwest::Client,
    token: Option<String>,
}

impl FinnhubAdapter {
    pub fn new(client: reqwest::Client, token: Option<String>) -> Self {
        Self { client, token }
    }
}

#[async_trait]
impl SourceAdapter for FinnhubAdapter {
    async fn fetch(&self, ticker: &str, limit: usize) -> Result<Vec<Post>> {
        let Some(token) = self.token.as_deref() else {
            tracing::warn!("FINNHUB_API_KEY not configured, skipping Finnhub");
            return Ok(Vec::new());
        };

        let symbol = ticker.to_uppercase();
        let now = Utc::now();
        let from = (now - Duration::days(2)).date_naive().to_string();
        let to = now.date_naive().to_string();

        let articles: Vec<Article> = self
            .client
            .get("https://finnhub.io/api/v1/company-news")
            .query(&[
                ("symbol", symbol.as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("token", token),
            ])
            .send()
            .await
            .context("finnhub news GET")?
            .error_for_status()
            .context("finnhub news status")?
            .json()
            .await
            .context("finnhub news body")?;

        let mut out = Vec::with_capacity(limit);
        for article in articles.into_iter().take(limit) {
            let content = normalize_text(&format!("{}. {}", article.headline, article.summary));
            if content.is_empty() {
                continue;
            }
            out.push(Post {
                source_id: format!("finnhub_{}", article.id),
                ticker: symbol.clone(),
                source: SourceKind::Finnhub,
                title: Some(article.headline),
                content,
                author: None,
                url: article.url,
                published_at: Utc
                    .timestamp_opt(article.datetime, 0)
                    .single()
                    .unwrap_or_else(Utc::now),
                metadata: json!({
                    "source": article.source,
                    "category": article.category,
                }),
            });
        }

        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Finnhub
    }
}
