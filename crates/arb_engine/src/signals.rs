//! Read side of the engine: the latest stored signals, or a fresh pass on demand.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::hubs::hub_label;
use common::{ArbitrageCandidate, Error, ThresholdOverrides};
use serde::{Deserialize, Serialize};

use crate::pipeline::{AnalysisPipeline, PipelineError};

pub const DEFAULT_SIGNAL_LIMIT: usize = 100;
pub const MAX_SIGNAL_LIMIT: usize = 1000;

/// Post-hoc filter over stored signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalFilter {
    #[serde(default)]
    pub min_ev: Option<f64>,
    #[serde(default)]
    pub min_margin_pct: Option<f64>,
}

impl SignalFilter {
    pub fn admits(&self, c: &ArbitrageCandidate) -> bool {
        self.min_ev.map_or(true, |v| c.ev_isk >= v)
            && self.min_margin_pct.map_or(true, |v| c.net_margin_pct >= v)
    }
}

/// One opportunity as presented to API and CLI consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageSignal {
    pub item_id: i64,
    pub from_hub_id: i64,
    pub to_hub_id: i64,
    pub from_hub: String,
    pub to_hub: String,
    pub buy_price: f64,
    pub sell_price: f64,
    pub spread_pct: f64,
    pub net_margin_pct: f64,
    pub fees_total: f64,
    pub ev_isk: f64,
    pub daily_liquidity: f64,
    pub decay_score: f64,
    pub capital_required: f64,
    pub route_risk: f64,
}

impl From<&ArbitrageCandidate> for ArbitrageSignal {
    fn from(c: &ArbitrageCandidate) -> Self {
        Self {
            item_id: c.item_id,
            from_hub_id: c.from_hub_id,
            to_hub_id: c.to_hub_id,
            from_hub: hub_label(c.from_hub_id),
            to_hub: hub_label(c.to_hub_id),
            buy_price: c.buy_price,
            sell_price: c.sell_price,
            spread_pct: c.spread_pct,
            net_margin_pct: c.net_margin_pct,
            fees_total: c.fees_total,
            ev_isk: c.ev_isk,
            daily_liquidity: c.liquidity_24h,
            decay_score: c.decay_score,
            capital_required: c.capital_required,
            route_risk: c.route_risk,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageResponse {
    pub run_id: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub count: usize,
    pub signals: Vec<ArbitrageSignal>,
}

impl ArbitrageResponse {
    pub fn empty() -> Self {
        Self {
            run_id: None,
            timestamp: None,
            count: 0,
            signals: Vec::new(),
        }
    }

    /// Response over already-ranked candidates, in the order given.
    pub fn build(
        run_id: Option<i64>,
        timestamp: Option<DateTime<Utc>>,
        candidates: &[ArbitrageCandidate],
    ) -> Self {
        let signals: Vec<ArbitrageSignal> = candidates.iter().map(ArbitrageSignal::from).collect();
        Self {
            run_id,
            timestamp,
            count: signals.len(),
            signals,
        }
    }
}

/// Clamp a requested limit into `1..=MAX_SIGNAL_LIMIT`.
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_SIGNAL_LIMIT)
        .clamp(1, MAX_SIGNAL_LIMIT)
}

#[derive(Clone)]
pub struct SignalService {
    pipeline: Arc<AnalysisPipeline>,
}

impl SignalService {
    pub fn new(pipeline: Arc<AnalysisPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Arc<AnalysisPipeline> {
        &self.pipeline
    }

    /// Signals of the most recent completed run, filtered, best EV first.
    ///
    /// No store or no completed run yields an empty response.
    pub fn latest_signals(
        &self,
        filter: &SignalFilter,
        limit: Option<usize>,
    ) -> Result<ArbitrageResponse, Error> {
        let Some(store) = self.pipeline.store() else {
            return Ok(ArbitrageResponse::empty());
        };
        let Some(run) = store.latest_completed_run()? else {
            return Ok(ArbitrageResponse::empty());
        };

        let mut items = store.items_for_run(run.run_id, None)?;
        items.retain(|c| filter.admits(c));
        items.truncate(clamp_limit(limit));

        let timestamp = run.completed_at.unwrap_or(run.created_at);
        Ok(ArbitrageResponse::build(Some(run.run_id), Some(timestamp), &items))
    }

    /// Run a fresh pass and return its signals.
    pub async fn analyze_now(
        &self,
        overrides: &ThresholdOverrides,
        persist: bool,
        limit: Option<usize>,
    ) -> Result<ArbitrageResponse, PipelineError> {
        let report = self.pipeline.run_once(overrides, persist).await?;
        let shown = clamp_limit(limit).min(report.candidates.len());
        Ok(ArbitrageResponse::build(
            report.run_id(),
            Some(report.finished_at),
            &report.candidates[..shown],
        ))
    }
}
