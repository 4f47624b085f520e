// src/ingest/sources/stocktwits.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;

use crate::ingest::normalize_text;
use crate::ingest::types::{Post, SourceAdapter, SourceKind};

#[derive(Debug, Deserialize)]
struct Stream {
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    id: i64,
    #[serde(default)]
    body: String,
    created_at: Option<String>,
    user: Option<StUser>,
    entities: Option<Entities>,
    conversation: Option<Conversation>,
}

#[derive(Debug, Deserialize)]
struct StUser {
    username: String,
}

#[derive(Debug, Deserialize)]
struct Entities {
    sentiment: Option<BasicSentiment>,
}

#[derive(Debug, Deserialize)]
struct BasicSentiment {
    basic: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Conversation {
    #[serde(default)]
    replies: i64,
}

pub struct StocktwitsAdapter {
    client: reqwest::Client,
}

impl StocktwitsAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for StocktwitsAdapter {
    async fn fetch(&self, ticker: &str, limit: usize) -> Result<Vec<Post>> {
        let symbol = ticker.to_uppercase();
        let url = format!("https://api.stocktwits.com/api/2/streams/symbol/{symbol}.json");

        let stream: Stream = self
            .client
            .get(&url)
            .query(&[("limit", limit.to_string())])
            .send()
            .await
            .context("stocktwits stream GET")?
            .error_for_status()
            .context("stocktwits stream status")?
            .json()
            .await
            .context("stocktwits stream body")?;

        let mut out = Vec::with_capacity(stream.messages.len().min(limit));
        for msg in stream.messages.into_iter().take(limit) {
            let content = normalize_text(&msg.body);
            if content.is_empty() {
                continue;
            }
            let username = msg.user.map(|u| u.username);
            let tagged = msg
                .entities
                .and_then(|e| e.sentiment)
                .and_then(|s| s.basic);
            out.push(Post {
                source_id: format!("stocktwits_{}", msg.id),
                ticker: symbol.clone(),
                source: SourceKind::Stocktwits,
                title: None,
                content,
                url: username
                    .as_deref()
                    .map(|u| format!("https://stocktwits.com/{u}/message/{}", msg.id)),
                author: username,
                published_at: msg
                    .created_at
                    .as_deref()
                    .and_then(|ts| ts.parse::<DateTime<Utc>>().ok())
                    .unwrap_or_else(Utc::now),
                metadata: json!({
                    "replies": msg.conversation.map(|c| c.replies).unwrap_or(0),
                    "sentiment": tagged,
                }),
            });
        }

        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Stocktwits
    }
}
