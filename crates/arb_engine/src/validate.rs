//! Pre-scoring sanity checks for raw candidates.
//!
//! The ranker accepts anything; this stage runs before it in the pipeline
//! so malformed observations are dropped with a reason instead of producing
//! nonsense scores.

use std::fmt;

use common::RawCandidate;

/// Why a raw candidate was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    NonFinite { field: &'static str },
    NonPositivePrice { field: &'static str },
    NegativeLiquidity,
    SameHub,
    NoSpread,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NonFinite { field } => write!(f, "{} is not finite", field),
            Rejection::NonPositivePrice { field } => write!(f, "{} must be positive", field),
            Rejection::NegativeLiquidity => write!(f, "liquidity_24h is negative"),
            Rejection::SameHub => write!(f, "from_hub_id equals to_hub_id"),
            Rejection::NoSpread => write!(f, "sell_price does not exceed buy_price"),
        }
    }
}

/// Check a single raw candidate.
pub fn validate(raw: &RawCandidate) -> Result<(), Rejection> {
    for (field, value) in [
        ("buy_price", raw.buy_price),
        ("sell_price", raw.sell_price),
        ("liquidity_24h", raw.liquidity_24h),
    ] {
        if !value.is_finite() {
            return Err(Rejection::NonFinite { field });
        }
    }
    if raw.price_history.iter().any(|p| !p.is_finite()) {
        return Err(Rejection::NonFinite {
            field: "price_history",
        });
    }

    if raw.buy_price <= 0.0 {
        return Err(Rejection::NonPositivePrice { field: "buy_price" });
    }
    if raw.sell_price <= 0.0 {
        return Err(Rejection::NonPositivePrice {
            field: "sell_price",
        });
    }
    if raw.liquidity_24h < 0.0 {
        return Err(Rejection::NegativeLiquidity);
    }
    if raw.from_hub_id == raw.to_hub_id {
        return Err(Rejection::SameHub);
    }
    if raw.sell_price <= raw.buy_price {
        return Err(Rejection::NoSpread);
    }

    Ok(())
}

/// Split a batch into accepted candidates and rejections (with input index).
pub fn partition_valid(raw: Vec<RawCandidate>) -> (Vec<RawCandidate>, Vec<(usize, Rejection)>) {
    let mut accepted = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();

    for (idx, candidate) in raw.into_iter().enumerate() {
        match validate(&candidate) {
            Ok(()) => accepted.push(candidate),
            Err(reason) => rejected.push((idx, reason)),
        }
    }

    (accepted, rejected)
}
