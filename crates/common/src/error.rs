//! Unified error type for eve-arb.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Market data fetch failed: {0}")]
    Fetch(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
