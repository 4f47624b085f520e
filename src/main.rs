//! Sentiment Ingestion Worker — Binary Entrypoint
//! Wires configuration, storage, source adapters, and the scorer into the
//! scheduler, then either runs a single cycle (`--once`) or stays up on the
//! internal schedule until Ctrl+C/SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ticker_sentiment_worker::ingest::sources::{
    FinnhubAdapter, NewsAdapter, RedditAdapter, StocktwitsAdapter,
};
use ticker_sentiment_worker::{
    IngestionWorker, LexiconScorer, PostgresStore, SourceAdapter, Store, WorkerConfig,
};

#[derive(Debug, Parser)]
#[command(
    name = "ticker-sentiment-worker",
    about = "Ingests social/news posts about stock tickers and aggregates sentiment snapshots",
    version
)]
struct Args {
    /// Run a single ingestion cycle and exit (for cron-style invocation).
    #[arg(long)]
    once: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = Args::parse();
    let cfg = WorkerConfig::from_env()?;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let store = PostgresStore::connect(&database_url, 8).await?;
    store.migrate().await?;
    let store: Arc<dyn Store> = Arc::new(store);

    let client = reqwest::Client::builder()
        .user_agent(concat!("ticker-sentiment-worker/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(cfg.fetch_timeout_secs))
        .build()
        .context("building HTTP client")?;

    let finnhub_token = std::env::var("FINNHUB_API_KEY").ok();
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(RedditAdapter::new(client.clone())),
        Arc::new(StocktwitsAdapter::new(client.clone())),
        Arc::new(NewsAdapter::new(client.clone())),
        Arc::new(FinnhubAdapter::new(client, finnhub_token)),
    ];

    let worker = Arc::new(IngestionWorker::new(
        cfg,
        adapters,
        Arc::new(LexiconScorer::new()),
        store,
    ));
    worker.initialize().await;

    if args.once {
        worker.run_cycle().await;
        tracing::info!("single cycle finished, exiting");
        return Ok(());
    }

    tokio::spawn(Arc::clone(&worker).run_scheduled());
    tokio::spawn(Arc::clone(&worker).run_end_of_day());
    tracing::info!("ingestion worker running, press Ctrl+C to stop");

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received Ctrl+C, exiting");
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, exiting");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("received Ctrl+C, exiting");
    }

    Ok(())
}
