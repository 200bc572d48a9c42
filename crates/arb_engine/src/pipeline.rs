//! One analysis pass: fetch → validate → rank → persist.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{ArbitrageCandidate, EngineConfig, Error, RunRecord, ThresholdConfig, ThresholdOverrides};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::ranker::OpportunityRanker;
use crate::source::{fetch_with_retry, MarketDataSource};
use crate::store::RunStore;
use crate::validate::partition_valid;

/// Pipeline stage, for log lines and error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Validate,
    Rank,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Fetch => "fetch",
            Stage::Validate => "validate",
            Stage::Rank => "rank",
            Stage::Persist => "persist",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed after {attempts} attempt(s): {source}")]
    Fetch { attempts: u32, source: Error },

    /// Scoring succeeded but the run could not be recorded.
    #[error("persist failed for {} scored candidate(s): {source}", .candidates.len())]
    Persist {
        candidates: Vec<ArbitrageCandidate>,
        source: Error,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Fetch { .. } => Stage::Fetch,
            PipelineError::Persist { .. } => Stage::Persist,
        }
    }

    /// Scored candidates that survived the failure, if any.
    pub fn into_candidates(self) -> Vec<ArbitrageCandidate> {
        match self {
            PipelineError::Fetch { .. } => Vec::new(),
            PipelineError::Persist { candidates, .. } => candidates,
        }
    }
}

impl From<PipelineError> for Error {
    fn from(e: PipelineError) -> Self {
        match e.stage() {
            Stage::Fetch => Error::Fetch(e.to_string()),
            _ => Error::Storage(e.to_string()),
        }
    }
}

/// Outcome of a successful pass.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// Set when the pass was persisted.
    pub run: Option<RunRecord>,
    pub candidates: Vec<ArbitrageCandidate>,
    pub thresholds: ThresholdConfig,
    pub fetched: usize,
    pub rejected: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AnalysisReport {
    pub fn run_id(&self) -> Option<i64> {
        self.run.as_ref().map(|r| r.run_id)
    }
}

pub struct AnalysisPipeline {
    source: Arc<dyn MarketDataSource>,
    ranker: OpportunityRanker,
    thresholds: ThresholdConfig,
    config: PipelineConfig,
    store: Option<Arc<dyn RunStore>>,
}

impl AnalysisPipeline {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        engine: &EngineConfig,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            ranker: OpportunityRanker::from_config(engine),
            thresholds: engine.thresholds,
            config,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_ranker(mut self, ranker: OpportunityRanker) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn store(&self) -> Option<&Arc<dyn RunStore>> {
        self.store.as_ref()
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Run one pass.
    ///
    /// With `persist`, a non-empty result is recorded as a completed run.
    /// Persisting without a configured store is a `Persist` error.
    pub async fn run_once(
        &self,
        overrides: &ThresholdOverrides,
        persist: bool,
    ) -> Result<AnalysisReport, PipelineError> {
        let started_at = Utc::now();
        let thresholds = self.thresholds.with_overrides(overrides);

        let raw = fetch_with_retry(self.source.as_ref(), &self.config.retry)
            .await
            .map_err(|(source, attempts)| PipelineError::Fetch { attempts, source })?;
        let fetched = raw.len();
        debug!("[{}] {} raw candidates from {}", Stage::Fetch, fetched, self.source.name());

        let (valid, rejected) = if self.config.validate_input {
            let (valid, rejected) = partition_valid(raw);
            for (idx, why) in &rejected {
                debug!("[{}] dropped candidate #{}: {}", Stage::Validate, idx, why);
            }
            if !rejected.is_empty() {
                warn!(
                    "[{}] dropped {} of {} candidates",
                    Stage::Validate,
                    rejected.len(),
                    fetched
                );
            }
            (valid, rejected.len())
        } else {
            (raw, 0)
        };

        let candidates = self.ranker.find_opportunities(&valid, &thresholds);
        info!(
            "[{}] {} opportunities from {} candidates",
            Stage::Rank,
            candidates.len(),
            valid.len()
        );

        let run = if persist && !candidates.is_empty() {
            match self.persist(&candidates) {
                Ok(run) => {
                    info!(
                        "[{}] run {} stored with {} items",
                        Stage::Persist,
                        run.run_id,
                        run.num_candidates
                    );
                    Some(run)
                }
                Err(source) => return Err(PipelineError::Persist { candidates, source }),
            }
        } else {
            None
        };

        Ok(AnalysisReport {
            run,
            candidates,
            thresholds,
            fetched,
            rejected,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn persist(&self, candidates: &[ArbitrageCandidate]) -> Result<RunRecord, Error> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| Error::Storage("no run store configured".into()))?;
        store.persist_run(candidates)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::source::StaticSource;
    use common::hubs::{AMARR, DODIXIE, JITA, RENS};
    use common::{RawCandidate, RunStatus};
    use parking_lot::Mutex;

    /// In-memory store; `fail_inserts` makes every batch insert fail.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub runs: Mutex<Vec<RunRecord>>,
        pub items: Mutex<Vec<(i64, ArbitrageCandidate)>>,
        pub fail_inserts: bool,
    }

    impl MemoryStore {
        fn set_status(&self, run_id: i64, status: RunStatus) -> Result<RunRecord, Error> {
            let mut runs = self.runs.lock();
            let run = runs
                .iter_mut()
                .find(|r| r.run_id == run_id)
                .ok_or_else(|| Error::Storage(format!("run {} not found", run_id)))?;
            run.status = status;
            run.completed_at = Some(Utc::now());
            Ok(run.clone())
        }
    }

    impl RunStore for MemoryStore {
        fn create_run(&self) -> Result<RunRecord, Error> {
            let mut runs = self.runs.lock();
            let run = RunRecord {
                run_id: runs.len() as i64 + 1,
                status: RunStatus::Running,
                created_at: Utc::now(),
                completed_at: None,
                num_candidates: 0,
            };
            runs.push(run.clone());
            Ok(run)
        }

        fn insert_items(&self, run_id: i64, items: &[ArbitrageCandidate]) -> Result<usize, Error> {
            if self.fail_inserts {
                return Err(Error::Storage("disk full".into()));
            }
            let mut stored = self.items.lock();
            stored.extend(items.iter().cloned().map(|c| (run_id, c)));
            Ok(items.len())
        }

        fn complete_run(&self, run_id: i64, num_candidates: usize) -> Result<RunRecord, Error> {
            self.set_status(run_id, RunStatus::Completed)?;
            let mut runs = self.runs.lock();
            let run = runs
                .iter_mut()
                .find(|r| r.run_id == run_id)
                .ok_or_else(|| Error::Storage(format!("run {} not found", run_id)))?;
            run.num_candidates = num_candidates as i64;
            Ok(run.clone())
        }

        fn fail_run(&self, run_id: i64) -> Result<(), Error> {
            self.set_status(run_id, RunStatus::Failed).map(|_| ())
        }

        fn delete_run_items(&self, run_id: i64) -> Result<usize, Error> {
            let mut stored = self.items.lock();
            let before = stored.len();
            stored.retain(|(id, _)| *id != run_id);
            Ok(before - stored.len())
        }

        fn latest_completed_run(&self) -> Result<Option<RunRecord>, Error> {
            Ok(self
                .runs
                .lock()
                .iter()
                .rev()
                .find(|r| r.status == RunStatus::Completed)
                .cloned())
        }

        fn items_for_run(
            &self,
            run_id: i64,
            limit: Option<usize>,
        ) -> Result<Vec<ArbitrageCandidate>, Error> {
            let mut out: Vec<ArbitrageCandidate> = self
                .items
                .lock()
                .iter()
                .filter(|(id, _)| *id == run_id)
                .map(|(_, c)| c.clone())
                .collect();
            out.sort_by(|a, b| b.ev_isk.total_cmp(&a.ev_isk));
            if let Some(limit) = limit {
                out.truncate(limit);
            }
            Ok(out)
        }
    }

    pub(crate) fn fixture() -> Vec<RawCandidate> {
        vec![
            RawCandidate::new(34, JITA, AMARR, 5.50, 6.80, 1_500_000_000.0),
            RawCandidate::new(35, DODIXIE, JITA, 12.20, 15.50, 1_500_000_000.0),
            RawCandidate::new(36, RENS, AMARR, 85.00, 110.00, 1_500_000_000.0),
        ]
    }

    pub(crate) fn open() -> ThresholdOverrides {
        ThresholdOverrides {
            min_ev: Some(0.0),
            min_margin_pct: Some(0.0),
            min_liquidity: Some(0.0),
        }
    }

    fn pipeline(raw: Vec<RawCandidate>) -> AnalysisPipeline {
        let config = PipelineConfig {
            retry: RetryConfig {
                max_attempts: 1,
                backoff_base_ms: 1,
                backoff_max_ms: 1,
            },
            validate_input: true,
        };
        AnalysisPipeline::new(
            Arc::new(StaticSource::new(raw)),
            &EngineConfig::default(),
            config,
        )
    }

    #[tokio::test]
    async fn test_default_thresholds_reject_fixture() {
        let report = pipeline(fixture())
            .run_once(&ThresholdOverrides::default(), false)
            .await
            .unwrap();
        assert_eq!(report.fetched, 3);
        assert!(report.candidates.is_empty());
        assert!(report.run.is_none());
    }

    #[tokio::test]
    async fn test_persisted_run_is_completed_with_items() {
        let store = Arc::new(MemoryStore::default());
        let report = pipeline(fixture())
            .with_store(store.clone())
            .run_once(&open(), true)
            .await
            .unwrap();

        let run = report.run.clone().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.num_candidates, 3);
        assert_eq!(report.run_id(), Some(run.run_id));
        assert_eq!(store.items_for_run(run.run_id, None).unwrap(), report.candidates);
    }

    #[tokio::test]
    async fn test_empty_result_is_not_persisted() {
        let store = Arc::new(MemoryStore::default());
        let report = pipeline(fixture())
            .with_store(store.clone())
            .run_once(&ThresholdOverrides::default(), true)
            .await
            .unwrap();
        assert!(report.run.is_none());
        assert!(store.runs.lock().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_input_is_dropped_before_ranking() {
        let mut raw = fixture();
        raw.push(RawCandidate::new(99, JITA, JITA, 1.0, 2.0, 1e9));
        raw.push(RawCandidate::new(98, JITA, AMARR, f64::NAN, 2.0, 1e9));
        let report = pipeline(raw).run_once(&open(), false).await.unwrap();
        assert_eq!(report.fetched, 5);
        assert_eq!(report.rejected, 2);
        assert_eq!(
            report.candidates.iter().map(|c| c.item_id).collect::<Vec<_>>(),
            vec![36, 35, 34]
        );
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_candidates_and_prior_runs() {
        let good = Arc::new(MemoryStore::default());
        let first = pipeline(fixture())
            .with_store(good.clone())
            .run_once(&open(), true)
            .await
            .unwrap();
        assert!(first.run.is_some());

        let bad = Arc::new(MemoryStore {
            runs: Mutex::new(good.runs.lock().clone()),
            items: Mutex::new(good.items.lock().clone()),
            fail_inserts: true,
        });
        let err = pipeline(fixture())
            .with_store(bad.clone())
            .run_once(&open(), true)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Persist);
        assert!(err.to_string().contains("disk full"));
        assert_eq!(err.into_candidates().len(), 3);

        let latest = bad.latest_completed_run().unwrap().unwrap();
        assert_eq!(latest.run_id, first.run_id().unwrap());
        let runs = bad.runs.lock();
        assert_eq!(runs.last().unwrap().status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_persist_without_store_is_an_error() {
        let err = pipeline(fixture()).run_once(&open(), true).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Persist);
    }

    struct DownSource;

    #[async_trait::async_trait]
    impl MarketDataSource for DownSource {
        fn name(&self) -> &str {
            "down"
        }

        async fn fetch_candidates(&self) -> Result<Vec<RawCandidate>, Error> {
            Err(Error::Fetch("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_reports_attempts() {
        let config = PipelineConfig {
            retry: RetryConfig {
                max_attempts: 2,
                backoff_base_ms: 1,
                backoff_max_ms: 1,
            },
            validate_input: true,
        };
        let p = AnalysisPipeline::new(Arc::new(DownSource), &EngineConfig::default(), config);
        match p.run_once(&open(), false).await {
            Err(PipelineError::Fetch { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected fetch error, got {:?}", other.map(|r| r.candidates)),
        }
    }
}
