//! Engine configuration types.
//!
//! Every knob has a serde default so a partial `config.toml` is valid.

use serde::{Deserialize, Serialize};

/// Everything the scoring engine needs, passed explicitly to its entry points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub fees: FeeConfig,

    #[serde(default)]
    pub thresholds: ThresholdConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// Trading fee percentages (percentage points, not fractions).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeConfig {
    #[serde(default = "default_broker_fee_pct")]
    pub broker_fee_pct: f64,

    #[serde(default = "default_sales_tax_pct")]
    pub sales_tax_pct: f64,
}

/// Filter thresholds applied after scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Minimum expected value in ISK.
    #[serde(default = "default_min_ev")]
    pub min_ev: f64,

    /// Minimum net margin, percent.
    #[serde(default = "default_min_margin_pct")]
    pub min_margin_pct: f64,

    /// Minimum trailing 24h liquidity in ISK.
    #[serde(default = "default_min_liquidity")]
    pub min_liquidity: f64,
}

/// Per-call threshold overrides. `None` keeps the configured value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOverrides {
    #[serde(default)]
    pub min_ev: Option<f64>,
    #[serde(default)]
    pub min_margin_pct: Option<f64>,
    #[serde(default)]
    pub min_liquidity: Option<f64>,
}

/// Policy constants for EV and decay scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Fraction of daily liquidity assumed capturable.
    #[serde(default = "default_capture_rate")]
    pub capture_rate: f64,

    #[serde(default)]
    pub decay: DecayWeights,
}

/// Weights and saturation references of the decay score.
///
/// The defaults are fixed design values; changing them changes every score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayWeights {
    #[serde(default = "default_margin_weight")]
    pub margin_weight: f64,

    #[serde(default = "default_liquidity_weight")]
    pub liquidity_weight: f64,

    #[serde(default = "default_volatility_weight")]
    pub volatility_weight: f64,

    /// Margin percent at which the margin component saturates.
    #[serde(default = "default_margin_saturation_pct")]
    pub margin_saturation_pct: f64,

    /// Liquidity (ISK) at which the log-scaled component saturates.
    #[serde(default = "default_liquidity_reference")]
    pub liquidity_reference: f64,

    /// Volatility percent at which the penalty saturates.
    #[serde(default = "default_volatility_saturation_pct")]
    pub volatility_saturation_pct: f64,
}

// ── Defaults ──────────────────────────────────────────────────────────

pub const DEFAULT_BROKER_FEE_PCT: f64 = 3.0;
pub const DEFAULT_SALES_TAX_PCT: f64 = 8.0;
pub const DEFAULT_MIN_EV_ISK: f64 = 200_000_000.0;
pub const DEFAULT_MIN_NET_MARGIN_PCT: f64 = 5.0;
pub const DEFAULT_MIN_LIQUIDITY_ISK_24H: f64 = 500_000_000.0;
pub const DEFAULT_CAPTURE_RATE: f64 = 0.1;

fn default_broker_fee_pct() -> f64 {
    DEFAULT_BROKER_FEE_PCT
}
fn default_sales_tax_pct() -> f64 {
    DEFAULT_SALES_TAX_PCT
}
fn default_min_ev() -> f64 {
    DEFAULT_MIN_EV_ISK
}
fn default_min_margin_pct() -> f64 {
    DEFAULT_MIN_NET_MARGIN_PCT
}
fn default_min_liquidity() -> f64 {
    DEFAULT_MIN_LIQUIDITY_ISK_24H
}
fn default_capture_rate() -> f64 {
    DEFAULT_CAPTURE_RATE
}
fn default_margin_weight() -> f64 {
    0.5
}
fn default_liquidity_weight() -> f64 {
    0.3
}
fn default_volatility_weight() -> f64 {
    0.2
}
fn default_margin_saturation_pct() -> f64 {
    50.0
}
fn default_liquidity_reference() -> f64 {
    1_000_000_000.0
}
fn default_volatility_saturation_pct() -> f64 {
    30.0
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            broker_fee_pct: default_broker_fee_pct(),
            sales_tax_pct: default_sales_tax_pct(),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_ev: default_min_ev(),
            min_margin_pct: default_min_margin_pct(),
            min_liquidity: default_min_liquidity(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            capture_rate: default_capture_rate(),
            decay: DecayWeights::default(),
        }
    }
}

impl Default for DecayWeights {
    fn default() -> Self {
        Self {
            margin_weight: default_margin_weight(),
            liquidity_weight: default_liquidity_weight(),
            volatility_weight: default_volatility_weight(),
            margin_saturation_pct: default_margin_saturation_pct(),
            liquidity_reference: default_liquidity_reference(),
            volatility_saturation_pct: default_volatility_saturation_pct(),
        }
    }
}

impl ThresholdConfig {
    /// Apply per-call overrides. An explicit zero is honoured.
    pub fn with_overrides(&self, overrides: &ThresholdOverrides) -> Self {
        Self {
            min_ev: overrides.min_ev.unwrap_or(self.min_ev),
            min_margin_pct: overrides.min_margin_pct.unwrap_or(self.min_margin_pct),
            min_liquidity: overrides.min_liquidity.unwrap_or(self.min_liquidity),
        }
    }

    /// Returns true when `self` admits everything `other` admits.
    pub fn is_at_least_as_permissive_as(&self, other: &ThresholdConfig) -> bool {
        self.min_ev <= other.min_ev
            && self.min_margin_pct <= other.min_margin_pct
            && self.min_liquidity <= other.min_liquidity
    }
}
