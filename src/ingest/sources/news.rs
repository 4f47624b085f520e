// src/ingest/sources/news.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use serde_json::json;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::ingest::normalize_text;
use crate::ingest::types::{Post, SourceAdapter, SourceKind};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

fn parse_rfc2822_to_unix(ts: &str) -> i64 {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .unwrap_or(0)
}

/// Financial-news headlines via the per-ticker RSS feed.
pub struct NewsAdapter {
    mode: Mode,
}

enum Mode {
    Http { client: reqwest::Client },
    // Own copy of the XML, for tests and offline runs.
    Fixture(String),
}

impl NewsAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http { client },
        }
    }

    pub fn from_fixture(content: &str) -> Self {
        Self {
            mode: Mode::Fixture(content.to_string()),
        }
    }

    fn parse_items(ticker: &str, xml: &str, limit: usize) -> Result<Vec<Post>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean).context("parsing news rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len().min(limit));
        for it in rss.channel.item.into_iter().take(limit) {
            let title = it.title.unwrap_or_default();
            let content = normalize_text(&format!(
                "{}. {}",
                title,
                it.description.as_deref().unwrap_or_default()
            ));
            if content.is_empty() {
                continue;
            }

            // The article link doubles as the stable per-item identity;
            // feeds without links fall back to the headline.
            let identity = it.link.clone().unwrap_or_else(|| title.clone());
            let unix = it
                .pub_date
                .as_deref()
                .map(parse_rfc2822_to_unix)
                .unwrap_or(0);

            out.push(Post {
                source_id: format!("news_{identity}"),
                ticker: ticker.to_uppercase(),
                source: SourceKind::News,
                title: Some(title),
                content,
                author: None,
                url: it.link,
                published_at: Utc
                    .timestamp_opt(unix, 0)
                    .single()
                    .unwrap_or_else(Utc::now),
                metadata: json!({}),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for NewsAdapter {
    async fn fetch(&self, ticker: &str, limit: usize) -> Result<Vec<Post>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_items(ticker, s, limit),
            Mode::Http { client } => {
                let url = format!(
                    "https://feeds.finance.yahoo.com/rss/2.0/headline?s={}&region=US&lang=en-US",
                    ticker.to_uppercase()
                );
                let body = client
                    .get(&url)
                    .send()
                    .await
                    .context("news rss GET")?
                    .error_for_status()
                    .context("news rss status")?
                    .text()
                    .await
                    .context("news rss body")?;
                Self::parse_items(ticker, &body, limit)
            }
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::News
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
