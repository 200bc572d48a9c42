//! Configuration structs for the analysis pipeline.

use serde::{Deserialize, Serialize};

/// Retry policy for the market data fetch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

/// Pipeline behaviour around the scoring engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub retry: RetryConfig,

    /// Drop malformed observations before scoring.
    #[serde(default = "default_true")]
    pub validate_input: bool,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    2_000
}
fn default_backoff_max_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            validate_input: true,
        }
    }
}
