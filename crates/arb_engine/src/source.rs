//! Where raw route observations come from.

use std::time::Duration;

use async_trait::async_trait;
use common::{Error, RawCandidate};
use tokio::time::sleep;
use tracing::{error, warn};

use crate::config::RetryConfig;

/// Supplies raw route observations to the pipeline.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    async fn fetch_candidates(&self) -> Result<Vec<RawCandidate>, Error>;
}

/// Fixed in-memory observations.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    candidates: Vec<RawCandidate>,
}

impl StaticSource {
    pub fn new(candidates: Vec<RawCandidate>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl MarketDataSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_candidates(&self) -> Result<Vec<RawCandidate>, Error> {
        Ok(self.candidates.clone())
    }
}

/// Backoff before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
pub fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    let ms = retry.backoff_base_ms.saturating_mul(factor);
    Duration::from_millis(ms.min(retry.backoff_max_ms))
}

/// Fetch with bounded retries and exponential backoff.
///
/// Returns the last error and the number of attempts made.
pub async fn fetch_with_retry(
    source: &dyn MarketDataSource,
    retry: &RetryConfig,
) -> Result<Vec<RawCandidate>, (Error, u32)> {
    let max_attempts = retry.max_attempts.max(1);

    let mut attempt = 1;
    loop {
        match source.fetch_candidates().await {
            Ok(candidates) => return Ok(candidates),
            Err(e) if attempt >= max_attempts => {
                error!(
                    "{}: fetch failed after {} attempts: {}",
                    source.name(),
                    attempt,
                    e
                );
                return Err((e, attempt));
            }
            Err(e) => {
                let delay = backoff_delay(retry, attempt);
                warn!(
                    "{}: fetch attempt {}/{} failed: {} (retrying in {}ms)",
                    source.name(),
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
