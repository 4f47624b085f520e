// src/ingest/sources/reddit.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;

use crate::ingest::normalize_text;
use crate::ingest::types::{Post, SourceAdapter, SourceKind};

/// Finance subreddits searched per cycle. The fetch budget is split evenly
/// across them.
const SUBREDDITS: [&str; 4] = ["stocks", "investing", "wallstreetbets", "StockMarket"];

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: RedditPost,
}

#[derive(Debug, Deserialize)]
struct RedditPost {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    author: Option<String>,
    permalink: Option<String>,
    created_utc: f64,
    #[serde(default)]
    ups: i64,
    #[serde(default)]
    num_comments: i64,
    #[serde(default)]
    subreddit: String,
}

pub struct RedditAdapter {
    client: reqwest::Client,
}

impl RedditAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn search_subreddit(
        &self,
        subreddit: &str,
        ticker: &str,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let url = format!("https://www.reddit.com/r/{subreddit}/search.json");
        let listing: Listing = self
            .client
            .get(&url)
            .query(&[
                ("q", ticker),
                ("restrict_sr", "on"),
                ("sort", "new"),
                ("t", "day"),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("reddit search GET r/{subreddit}"))?
            .error_for_status()
            .with_context(|| format!("reddit search status r/{subreddit}"))?
            .json()
            .await
            .with_context(|| format!("reddit search body r/{subreddit}"))?;

        let mut out = Vec::with_capacity(listing.data.children.len());
        for child in listing.data.children {
            let p = child.data;
            let content = normalize_text(&format!("{}. {}", p.title, p.selftext));
            if content.is_empty() {
                continue;
            }
            out.push(Post {
                source_id: format!("reddit_{}", p.id),
                ticker: ticker.to_uppercase(),
                source: SourceKind::Reddit,
                title: Some(p.title),
                content,
                author: p.author,
                url: p
                    .permalink
                    .map(|perma| format!("https://www.reddit.com{perma}")),
                published_at: Utc
                    .timestamp_opt(p.created_utc as i64, 0)
                    .single()
                    .unwrap_or_else(Utc::now),
                metadata: json!({
                    "upvotes": p.ups,
                    "comments": p.num_comments,
                    "subreddit": p.subreddit,
                }),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    async fn fetch(&self, ticker: &str, limit: usize) -> Result<Vec<Post>> {
        let per_subreddit = limit.div_ceil(SUBREDDITS.len());
        let mut out = Vec::new();

        // One dead subreddit must not cost us the others.
        for subreddit in SUBREDDITS {
            match self.search_subreddit(subreddit, ticker, per_subreddit).await {
                Ok(mut posts) => out.append(&mut posts),
                Err(e) => {
                    tracing::warn!(subreddit, error = ?e, "reddit subreddit fetch failed");
                    counter!("ingest_provider_errors_total").increment(1);
                }
            }
        }

        out.truncate(limit);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Reddit
    }
}
