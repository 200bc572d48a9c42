//! Opportunity ranker. Scores raw route observations, filters them by
//! thresholds, and orders the survivors by expected value.
//!
//! Scoring is pure and single-pass; nothing here performs I/O or fails.

use std::sync::Arc;

use common::{ArbitrageCandidate, EngineConfig, RawCandidate, ScoringConfig, ThresholdConfig};
use tracing::debug;

use crate::fees::FeeModel;
use crate::risk::{decay_score_with, price_volatility, FlatRouteRisk, RouteRisk};

pub struct OpportunityRanker {
    fees: FeeModel,
    scoring: ScoringConfig,
    route_risk: Arc<dyn RouteRisk>,
}

impl OpportunityRanker {
    pub fn new(fees: FeeModel, scoring: ScoringConfig) -> Self {
        Self {
            fees,
            scoring,
            route_risk: Arc::new(FlatRouteRisk::default()),
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(FeeModel::from_config(&cfg.fees), cfg.scoring)
    }

    /// Swap in a different route-risk model.
    pub fn with_route_risk(mut self, route_risk: Arc<dyn RouteRisk>) -> Self {
        self.route_risk = route_risk;
        self
    }

    /// Score one raw observation. No filtering.
    pub fn score(&self, raw: &RawCandidate) -> ArbitrageCandidate {
        let spread_pct = self.fees.spread_pct(raw.buy_price, raw.sell_price);
        let fees_total = self.fees.total_fees(raw.buy_price, raw.sell_price);
        let net_margin_pct = self.fees.net_margin_pct(raw.buy_price, raw.sell_price);

        let volatility = price_volatility(&raw.price_history);
        let decay_score = decay_score_with(
            &self.scoring.decay,
            net_margin_pct,
            raw.liquidity_24h,
            volatility,
        );

        // One day of trading at the assumed capture rate.
        let capital_required = raw.liquidity_24h * self.scoring.capture_rate;
        let ev_isk = capital_required * (net_margin_pct / 100.0);

        ArbitrageCandidate {
            item_id: raw.item_id,
            from_hub_id: raw.from_hub_id,
            to_hub_id: raw.to_hub_id,
            buy_price: raw.buy_price,
            sell_price: raw.sell_price,
            spread_pct,
            fees_total,
            liquidity_24h: raw.liquidity_24h,
            ev_isk,
            net_margin_pct,
            decay_score,
            capital_required,
            route_risk: self
                .route_risk
                .route_risk(raw.from_hub_id, raw.to_hub_id),
        }
    }

    /// Score every observation without filtering, in input order.
    pub fn score_all(&self, raw_candidates: &[RawCandidate]) -> Vec<ArbitrageCandidate> {
        raw_candidates.iter().map(|raw| self.score(raw)).collect()
    }

    /// Score, filter by `thresholds`, and sort by EV descending.
    ///
    /// The sort is stable: candidates with equal EV keep their input order.
    pub fn find_opportunities(
        &self,
        raw_candidates: &[RawCandidate],
        thresholds: &ThresholdConfig,
    ) -> Vec<ArbitrageCandidate> {
        let scored = self.score_all(raw_candidates);
        let total = scored.len();

        let mut filtered: Vec<ArbitrageCandidate> = scored
            .into_iter()
            .filter(|c| passes_thresholds(c, thresholds))
            .collect();

        filtered.sort_by(|a, b| b.ev_isk.total_cmp(&a.ev_isk));

        debug!(
            "Ranked {} of {} candidates (min_ev={} min_margin={}% min_liquidity={})",
            filtered.len(),
            total,
            thresholds.min_ev,
            thresholds.min_margin_pct,
            thresholds.min_liquidity
        );

        filtered
    }
}

/// All three threshold predicates.
pub fn passes_thresholds(c: &ArbitrageCandidate, thresholds: &ThresholdConfig) -> bool {
    c.ev_isk >= thresholds.min_ev
        && c.net_margin_pct >= thresholds.min_margin_pct
        && c.liquidity_24h >= thresholds.min_liquidity
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::hubs::{AMARR, DODIXIE, JITA, RENS};

    fn fixture() -> Vec<RawCandidate> {
        vec![
            RawCandidate::new(34, JITA, AMARR, 5.50, 6.80, 1_500_000_000.0),
            RawCandidate::new(35, DODIXIE, JITA, 12.20, 15.50, 1_500_000_000.0),
            RawCandidate::new(36, RENS, AMARR, 85.00, 110.00, 1_500_000_000.0),
        ]
    }

    fn open_thresholds() -> ThresholdConfig {
        ThresholdConfig {
            min_ev: 0.0,
            min_margin_pct: 0.0,
            min_liquidity: 0.0,
        }
    }

    fn ranker() -> OpportunityRanker {
        OpportunityRanker::from_config(&EngineConfig::default())
    }

    #[test]
    fn test_score_tritanium_end_to_end() {
        let c = ranker().score(&fixture()[0]);

        assert!((c.spread_pct - 23.636_363_636).abs() < 1e-6);
        // 0.165 + 0.204 + 0.544
        assert!((c.fees_total - 0.913).abs() < 1e-9);
        // (1.30 - 0.913) / 5.50
        let margin = (1.30 - 0.913) / 5.50 * 100.0;
        assert!((c.net_margin_pct - margin).abs() < 1e-6);
        assert!((c.capital_required - 150_000_000.0).abs() < 1e-3);
        assert!((c.ev_isk - 150_000_000.0 * margin / 100.0).abs() < 1e-3);
        // liquidity saturates, margin 7.04% of 50%
        assert!((c.decay_score - (0.5 * margin / 50.0 + 0.3) * 100.0).abs() < 1e-6);
        assert_eq!(c.route_risk, 50.0);
    }

    #[test]
    fn test_fixture_is_below_default_ev_floor() {
        // 10% of 1.5B ISK at ~7–12% margin is well under the 200M EV floor.
        let out = ranker().find_opportunities(&fixture(), &ThresholdConfig::default());
        assert!(out.is_empty());
    }

    #[test]
    fn test_open_thresholds_return_all_sorted_by_ev() {
        let out = ranker().find_opportunities(&fixture(), &open_thresholds());
        assert_eq!(out.len(), 3);
        assert_eq!(
            out.iter().map(|c| c.item_id).collect::<Vec<_>>(),
            vec![36, 35, 34]
        );
        assert!(out.windows(2).all(|w| w[0].ev_isk >= w[1].ev_isk));
    }

    #[test]
    fn test_every_result_satisfies_thresholds() {
        let mut raw = fixture();
        raw.push(RawCandidate::new(37, JITA, RENS, 10.0, 10.5, 9e9));
        raw.push(RawCandidate::new(38, AMARR, JITA, 1.0, 3.0, 1e6));
        let thresholds = ThresholdConfig {
            min_ev: 1_000_000.0,
            min_margin_pct: 8.0,
            min_liquidity: 1e8,
        };

        let out = ranker().find_opportunities(&raw, &thresholds);
        assert!(!out.is_empty());
        for c in &out {
            assert!(passes_thresholds(c, &thresholds), "{:?}", c);
        }
        assert!(out.iter().all(|c| c.item_id != 37 && c.item_id != 38));
    }

    #[test]
    fn test_permissive_thresholds_never_return_fewer() {
        let raw = fixture();
        let strict = ThresholdConfig {
            min_ev: 1e12,
            min_margin_pct: 90.0,
            min_liquidity: 5e8,
        };
        let loose = ThresholdConfig {
            min_ev: 1e6,
            min_margin_pct: 1.0,
            min_liquidity: 0.0,
        };
        assert!(loose.is_at_least_as_permissive_as(&strict));

        let r = ranker();
        let strict_out = r.find_opportunities(&raw, &strict);
        let loose_out = r.find_opportunities(&raw, &loose);
        assert!(loose_out.len() >= strict_out.len());
        assert_eq!(strict_out.len(), 0);
        assert_eq!(loose_out.len(), 3);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let raw = vec![
            RawCandidate::new(1, JITA, AMARR, 10.0, 20.0, 1e9),
            RawCandidate::new(2, JITA, AMARR, 10.0, 20.0, 1e9),
            RawCandidate::new(3, JITA, AMARR, 10.0, 30.0, 1e9),
            RawCandidate::new(4, JITA, AMARR, 10.0, 20.0, 1e9),
        ];
        let out = ranker().find_opportunities(&raw, &open_thresholds());
        assert_eq!(
            out.iter().map(|c| c.item_id).collect::<Vec<_>>(),
            vec![3, 1, 2, 4]
        );
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let mut raw = fixture();
        raw[1] = raw[1].clone().with_price_history(vec![14.0, 15.5, 16.1, 15.0]);
        let r = ranker();
        let first = r.find_opportunities(&raw, &open_thresholds());
        let second = r.find_opportunities(&raw, &open_thresholds());
        assert_eq!(first, second);
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.ev_isk.to_bits(), b.ev_isk.to_bits());
            assert_eq!(a.decay_score.to_bits(), b.decay_score.to_bits());
        }
    }

    #[test]
    fn test_price_history_lowers_decay_score() {
        let r = ranker();
        let calm = r.score(&fixture()[2]);
        let noisy = r.score(
            &fixture()[2]
                .clone()
                .with_price_history(vec![90.0, 130.0, 100.0, 120.0]),
        );
        assert!(noisy.decay_score < calm.decay_score);
        assert_eq!(noisy.ev_isk, calm.ev_isk);
    }

    #[test]
    fn test_ranker_does_not_validate_input() {
        let raw = vec![RawCandidate::new(9, JITA, JITA, 0.0, 5.0, 1e9)];
        let scored = ranker().score_all(&raw);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].net_margin_pct, 0.0);
        assert_eq!(scored[0].spread_pct, 0.0);
        assert_eq!(scored[0].ev_isk, 0.0);
    }

    struct DistanceRisk;

    impl RouteRisk for DistanceRisk {
        fn route_risk(&self, from_hub_id: i64, to_hub_id: i64) -> f64 {
            ((from_hub_id - to_hub_id).abs() % 100) as f64
        }
    }

    #[test]
    fn test_custom_route_risk_is_reported_not_ranked() {
        let r = ranker().with_route_risk(Arc::new(DistanceRisk));
        let out = r.find_opportunities(&fixture(), &open_thresholds());
        let tritanium = out.iter().find(|c| c.item_id == 34).unwrap();
        assert_eq!(tritanium.route_risk, ((JITA - AMARR).abs() % 100) as f64);
        assert_eq!(
            out.iter().map(|c| c.item_id).collect::<Vec<_>>(),
            vec![36, 35, 34]
        );
    }

    #[test]
    fn test_capture_rate_is_configurable() {
        let mut cfg = EngineConfig::default();
        cfg.scoring.capture_rate = 0.2;
        let doubled = OpportunityRanker::from_config(&cfg).score(&fixture()[0]);
        let base = ranker().score(&fixture()[0]);
        assert!((doubled.ev_isk - 2.0 * base.ev_isk).abs() < 1e-3);
        assert!((doubled.capital_required - 300_000_000.0).abs() < 1e-3);
    }
}
