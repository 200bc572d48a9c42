//! Domain types shared across the engine and the service shell.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Market observations ───────────────────────────────────────────────

/// Which side of the book a quote sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Standing buy order; we can sell into it.
    Buy,
    /// Standing sell order; we can buy from it.
    Sell,
}

/// A single observed price point at a hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub item_id: i64,
    pub hub_id: i64,
    pub side: Side,
    pub price: f64,
    pub quantity: i64,
    pub observed_at: DateTime<Utc>,
}

/// Unscored route observation handed to the ranker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub item_id: i64,
    pub from_hub_id: i64,
    pub to_hub_id: i64,
    pub buy_price: f64,
    pub sell_price: f64,
    /// Trailing 24h traded value in ISK.
    pub liquidity_24h: f64,
    /// Recent prices at the sell hub; empty means zero volatility.
    #[serde(default)]
    pub price_history: Vec<f64>,
}

impl RawCandidate {
    pub fn new(
        item_id: i64,
        from_hub_id: i64,
        to_hub_id: i64,
        buy_price: f64,
        sell_price: f64,
        liquidity_24h: f64,
    ) -> Self {
        Self {
            item_id,
            from_hub_id,
            to_hub_id,
            buy_price,
            sell_price,
            liquidity_24h,
            price_history: Vec::new(),
        }
    }

    pub fn with_price_history(mut self, prices: Vec<f64>) -> Self {
        self.price_history = prices;
        self
    }
}

// ── Scored output ─────────────────────────────────────────────────────

/// A scored cross-hub opportunity. Built once by the ranker, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageCandidate {
    pub item_id: i64,
    pub from_hub_id: i64,
    pub to_hub_id: i64,
    pub buy_price: f64,
    pub sell_price: f64,
    /// Raw spread before fees, percent of buy price.
    pub spread_pct: f64,
    /// Per-unit round-trip fees.
    pub fees_total: f64,
    pub liquidity_24h: f64,
    /// Expected captured value in ISK.
    pub ev_isk: f64,
    pub net_margin_pct: f64,
    /// 0–100, higher means a more durable opportunity.
    pub decay_score: f64,
    pub capital_required: f64,
    /// Reported by the configured route-risk model; not used for ranking.
    pub route_risk: f64,
}

// ── Runs ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// One analysis pass as recorded by the run store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: i64,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub num_candidates: i64,
}
