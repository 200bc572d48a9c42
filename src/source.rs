//! Market snapshot file source.
//!
//! An external ingester writes the latest order quotes to a JSON file; each
//! fetch re-reads it and aggregates the quotes into route candidates.

use std::path::PathBuf;

use arb_engine::quotes::QuoteBook;
use arb_engine::source::MarketDataSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Error, PriceQuote, RawCandidate};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// End of the trailing 24h liquidity window.
    pub as_of: DateTime<Utc>,

    #[serde(default)]
    pub quotes: Vec<PriceQuote>,

    #[serde(default)]
    pub history: Vec<PriceHistory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub item_id: i64,
    pub hub_id: i64,
    pub prices: Vec<f64>,
}

impl MarketSnapshot {
    pub fn into_candidates(self) -> Vec<RawCandidate> {
        let mut book = QuoteBook::from_quotes(&self.quotes, self.as_of);
        for h in self.history {
            book = book.with_history(h.item_id, h.hub_id, h.prices);
        }
        book.candidates()
    }
}

pub struct SnapshotFileSource {
    path: PathBuf,
    label: String,
}

impl SnapshotFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = format!("snapshot:{}", path.display());
        Self { path, label }
    }
}

#[async_trait]
impl MarketDataSource for SnapshotFileSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch_candidates(&self) -> Result<Vec<RawCandidate>, Error> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::Fetch(format!("read {}: {}", self.path.display(), e)))?;
        let snapshot: MarketSnapshot = serde_json::from_slice(&bytes)?;
        debug!(
            "{}: {} quotes as of {}",
            self.label,
            snapshot.quotes.len(),
            snapshot.as_of
        );
        Ok(snapshot.into_candidates())
    }
}
