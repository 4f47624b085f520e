// src/ingest/sources/mod.rs
pub mod finnhub;
pub mod news;
pub mod reddit;
pub mod stocktwits;

pub use finnhub::FinnhubAdapter;
pub use news::NewsAdapter;
pub use reddit::RedditAdapter;
pub use stocktwits::StocktwitsAdapter;

use crate::ingest::types::SourceKind;

/// Per-cycle fetch budget per source. Reddit dominates by volume; Finnhub
/// is kept small to stay inside its hourly request quota.
pub fn default_limit(kind: SourceKind) -> usize {
    match kind {
        SourceKind::Reddit => 75,
        SourceKind::Stocktwits => 30,
        SourceKind::News => 20,
        SourceKind::Finnhub => 8,
    }
}
