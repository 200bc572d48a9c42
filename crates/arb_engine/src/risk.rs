//! Risk scoring: price volatility, the decay score and route risk.

use common::DecayWeights;

/// Coefficient of variation of a price series, in percent.
///
/// Uses population variance (`/ n`). Returns 0 for fewer than two prices
/// or a zero mean.
pub fn price_volatility(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }

    let n = prices.len() as f64;
    let mean = prices.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return 0.0;
    }

    let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean * 100.0
}

/// Decay score with the default weights. See [`decay_score_with`].
pub fn decay_score(net_margin_pct: f64, liquidity_24h: f64, volatility: f64) -> f64 {
    decay_score_with(
        &DecayWeights::default(),
        net_margin_pct,
        liquidity_24h,
        volatility,
    )
}

/// Composite 0–100 score; higher means a more durable opportunity.
///
/// `margin/sat` and `log10(liq)/log10(ref)` are capped at 1 and rewarded,
/// `vol/sat` is capped at 1 and penalized.
pub fn decay_score_with(
    weights: &DecayWeights,
    net_margin_pct: f64,
    liquidity_24h: f64,
    volatility: f64,
) -> f64 {
    let margin_component = (net_margin_pct / weights.margin_saturation_pct).min(1.0);

    let liquidity_component =
        (liquidity_24h.max(1.0).log10() / weights.liquidity_reference.log10()).min(1.0);

    let volatility_penalty = (volatility / weights.volatility_saturation_pct).min(1.0);

    let score = weights.margin_weight * margin_component
        + weights.liquidity_weight * liquidity_component
        - weights.volatility_weight * volatility_penalty;

    (score * 100.0).clamp(0.0, 100.0)
}

/// Route danger model keyed on the hub pair.
pub trait RouteRisk: Send + Sync {
    /// Risk rating for hauling from `from_hub_id` to `to_hub_id`, 0–100.
    fn route_risk(&self, from_hub_id: i64, to_hub_id: i64) -> f64;
}

/// Placeholder model: every route is medium risk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatRouteRisk {
    pub value: f64,
}

pub const DEFAULT_ROUTE_RISK: f64 = 50.0;

impl Default for FlatRouteRisk {
    fn default() -> Self {
        Self {
            value: DEFAULT_ROUTE_RISK,
        }
    }
}

impl RouteRisk for FlatRouteRisk {
    fn route_risk(&self, _from_hub_id: i64, _to_hub_id: i64) -> f64 {
        self.value
    }
}

/// Route risk from the default placeholder model.
pub fn route_risk_placeholder(from_hub_id: i64, to_hub_id: i64) -> f64 {
    FlatRouteRisk::default().route_risk(from_hub_id, to_hub_id)
}
