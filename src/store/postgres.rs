// src/store/postgres.rs
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;

use crate::snapshot::{OverallSentiment, SentimentSnapshot, TimeWindow};
use crate::store::{ProcessedId, Store};

const SCHEMA: &str = include_str!("schema.sql");

/// PostgreSQL-backed [`Store`] with connection pooling.
///
/// The snapshot breakdown and per-source maps are stored as JSONB; scalar
/// fields get their own indexed columns so retention sweeps and windowed
/// reads stay cheap.
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, pool_size: usize) -> Result<Self> {
        tracing::info!("connecting to PostgreSQL");

        let pg_config: tokio_postgres::Config = database_url
            .parse()
            .context("parsing DATABASE_URL")?;

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(pool_size)
            .build()
            .context("building PostgreSQL connection pool")?;

        // Probe the pool with a few retries so a slow-starting database
        // does not kill the worker outright.
        let max_retries = 3u32;
        let mut retries = 0u32;
        loop {
            match pool.get().await {
                Ok(_conn) => {
                    tracing::info!("connected to PostgreSQL");
                    return Ok(Self { pool });
                }
                Err(e) => {
                    retries += 1;
                    if retries >= max_retries {
                        return Err(anyhow!(
                            "failed to connect to PostgreSQL after {max_retries} attempts: {e}"
                        ));
                    }
                    let delay = std::time::Duration::from_millis(100 * 2_u64.pow(retries));
                    tracing::warn!(
                        attempt = retries,
                        ?delay,
                        error = %e,
                        "PostgreSQL connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Apply the embedded schema. All statements are idempotent
    /// (`CREATE ... IF NOT EXISTS`), so this is safe on every startup.
    pub async fn migrate(&self) -> Result<()> {
        let client = self.pool.get().await?;
        for stmt in SCHEMA.split(';') {
            let stmt = stmt.trim();
            if stmt.is_empty() {
                continue;
            }
            client
                .execute(stmt, &[])
                .await
                .with_context(|| format!("executing migration statement: {stmt}"))?;
        }
        tracing::info!("PostgreSQL schema applied");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .query_one("SELECT 1", &[])
            .await
            .context("PostgreSQL health check failed")?;
        Ok(())
    }
}

fn row_to_snapshot(row: &tokio_postgres::Row) -> Result<SentimentSnapshot> {
    let window: String = row.get("time_window");
    let overall: String = row.get("overall_sentiment");
    let total_posts: i64 = row.get("total_posts");

    Ok(SentimentSnapshot {
        ticker: row.get("ticker"),
        timestamp: row.get("ts"),
        time_window: TimeWindow::parse(&window)
            .ok_or_else(|| anyhow!("unknown time_window value: {window}"))?,
        total_posts: total_posts as u64,
        sentiment_breakdown: serde_json::from_value(row.get("sentiment_breakdown"))
            .context("decoding sentiment_breakdown")?,
        sources: serde_json::from_value(row.get("sources")).context("decoding sources")?,
        overall_sentiment: OverallSentiment::parse(&overall)
            .ok_or_else(|| anyhow!("unknown overall_sentiment value: {overall}"))?,
        confidence: row.get("confidence"),
        volatility: row.get("volatility"),
    })
}

#[async_trait::async_trait]
impl Store for PostgresStore {
    async fn save_snapshot(&self, snapshot: &SentimentSnapshot) -> Result<()> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO sentiment_snapshots (
                ticker, ts, time_window, total_posts,
                sentiment_breakdown, sources,
                overall_sentiment, confidence, volatility
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#;

        let breakdown = serde_json::to_value(&snapshot.sentiment_breakdown)
            .context("encoding sentiment_breakdown")?;
        let sources = serde_json::to_value(&snapshot.sources).context("encoding sources")?;
        let total_posts = snapshot.total_posts as i64;

        client
            .execute(
                query,
                &[
                    &snapshot.ticker,
                    &snapshot.timestamp,
                    &snapshot.time_window.as_str(),
                    &total_posts,
                    &breakdown,
                    &sources,
                    &snapshot.overall_sentiment.as_str(),
                    &snapshot.confidence,
                    &snapshot.volatility,
                ],
            )
            .await
            .context("inserting snapshot")?;
        Ok(())
    }

    async fn find_recent_snapshots(
        &self,
        ticker: &str,
        time_window: TimeWindow,
        limit: i64,
    ) -> Result<Vec<SentimentSnapshot>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT ticker, ts, time_window, total_posts,
                   sentiment_breakdown, sources,
                   overall_sentiment, confidence, volatility
            FROM sentiment_snapshots
            WHERE ticker = $1 AND time_window = $2
            ORDER BY ts DESC
            LIMIT $3
        "#;

        let rows = client
            .query(query, &[&ticker, &time_window.as_str(), &limit])
            .await?;
        rows.iter().map(row_to_snapshot).collect()
    }

    async fn find_snapshots_since(
        &self,
        ticker: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SentimentSnapshot>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT ticker, ts, time_window, total_posts,
                   sentiment_breakdown, sources,
                   overall_sentiment, confidence, volatility
            FROM sentiment_snapshots
            WHERE ticker = $1 AND ts >= $2
            ORDER BY ts ASC
        "#;

        let rows = client.query(query, &[&ticker, &since]).await?;
        rows.iter().map(row_to_snapshot).collect()
    }

    async fn delete_snapshots_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM sentiment_snapshots WHERE ts < $1", &[&cutoff])
            .await
            .context("deleting old snapshots")?;
        Ok(deleted)
    }

    async fn insert_processed_ids(&self, batch: &[ProcessedId]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        const COLS_PER_ROW: usize = 3;
        const BATCH_SIZE: usize = 500;

        let client = self.pool.get().await?;

        for chunk in batch.chunks(BATCH_SIZE) {
            let values_clauses: Vec<String> = chunk
                .iter()
                .enumerate()
                .map(|(i, _)| {
                    let start = i * COLS_PER_ROW + 1;
                    format!("(${}, ${}, ${})", start, start + 1, start + 2)
                })
                .collect();

            // Duplicate-key races with another writer are benign here; the
            // in-memory ledger already holds these IDs for this process.
            let query = format!(
                "INSERT INTO processed_post_ids (source_id, ticker, processed_at) \
                 VALUES {} ON CONFLICT (source_id) DO NOTHING",
                values_clauses.join(", ")
            );

            let mut params: Vec<&(dyn ToSql + Sync)> =
                Vec::with_capacity(chunk.len() * COLS_PER_ROW);
            for rec in chunk {
                params.push(&rec.source_id);
                params.push(&rec.ticker);
                params.push(&rec.processed_at);
            }

            client
                .execute(query.as_str(), &params)
                .await
                .context("inserting processed ids")?;
        }

        Ok(())
    }

    async fn find_processed_ids(
        &self,
        ticker: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT source_id FROM processed_post_ids \
                 WHERE ticker = $1 AND processed_at >= $2",
                &[&ticker, &since],
            )
            .await
            .context("loading processed ids")?;
        Ok(rows.iter().map(|r| r.get("source_id")).collect())
    }

    async fn expire_processed_ids(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute(
                "DELETE FROM processed_post_ids WHERE processed_at < $1",
                &[&cutoff],
            )
            .await
            .context("expiring processed ids")?;
        Ok(deleted)
    }
}
