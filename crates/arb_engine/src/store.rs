//! Where scored runs are recorded.
//!
//! A run moves `running → completed` (or `failed`). Readers only ever see
//! items of completed runs, so a failed write never surfaces half a batch.

use common::{ArbitrageCandidate, Error, RunRecord};
use tracing::warn;

pub trait RunStore: Send + Sync {
    /// Open a new run in the `running` state.
    fn create_run(&self) -> Result<RunRecord, Error>;

    /// Insert a batch of scored candidates under `run_id`.
    fn insert_items(&self, run_id: i64, items: &[ArbitrageCandidate]) -> Result<usize, Error>;

    /// Mark a run completed, stamping `completed_at` and the candidate count.
    fn complete_run(&self, run_id: i64, num_candidates: usize) -> Result<RunRecord, Error>;

    /// Mark a run failed. Never touches other runs.
    fn fail_run(&self, run_id: i64) -> Result<(), Error>;

    fn delete_run_items(&self, run_id: i64) -> Result<usize, Error>;

    /// Most recent run in the `completed` state.
    fn latest_completed_run(&self) -> Result<Option<RunRecord>, Error>;

    /// Items of a run ordered by EV descending.
    fn items_for_run(
        &self,
        run_id: i64,
        limit: Option<usize>,
    ) -> Result<Vec<ArbitrageCandidate>, Error>;

    /// Record a whole run: create, insert, complete.
    ///
    /// On failure the run's items are removed and the run is marked failed.
    /// Transactional stores should override this with a single transaction.
    fn persist_run(&self, candidates: &[ArbitrageCandidate]) -> Result<RunRecord, Error> {
        let run = self.create_run()?;
        let written = self
            .insert_items(run.run_id, candidates)
            .and_then(|_| self.complete_run(run.run_id, candidates.len()));

        match written {
            Ok(record) => Ok(record),
            Err(e) => {
                if let Err(cleanup) = self.delete_run_items(run.run_id) {
                    warn!("run {}: item cleanup failed: {}", run.run_id, cleanup);
                }
                if let Err(mark) = self.fail_run(run.run_id) {
                    warn!("run {}: could not mark failed: {}", run.run_id, mark);
                }
                Err(e)
            }
        }
    }
}
