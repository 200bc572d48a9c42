//! Fee model for cross-hub trades.
//!
//! A round trip pays the broker fee on the buy leg, and both the broker fee
//! and sales tax on the sell leg. All percentages are percentage points.
//! Degenerate inputs (`buy_price <= 0`) map to zero, never to an error.

use common::FeeConfig;

/// Broker fee charged on one order.
pub fn broker_fee(price: f64, fee_pct: f64) -> f64 {
    price * (fee_pct / 100.0)
}

/// Sales tax charged on a sale.
pub fn sales_tax(price: f64, tax_pct: f64) -> f64 {
    price * (tax_pct / 100.0)
}

/// Per-unit fees for a full buy-then-sell round trip.
pub fn total_fees(buy_price: f64, sell_price: f64, fee_pct: f64, tax_pct: f64) -> f64 {
    let buy_broker = broker_fee(buy_price, fee_pct);
    let sell_broker = broker_fee(sell_price, fee_pct);
    let sell_tax = sales_tax(sell_price, tax_pct);
    buy_broker + sell_broker + sell_tax
}

/// Profit after fees for `quantity` units. Fees scale linearly with quantity.
pub fn net_profit(
    buy_price: f64,
    sell_price: f64,
    quantity: i64,
    fee_pct: f64,
    tax_pct: f64,
) -> f64 {
    let qty = quantity as f64;
    let gross = (sell_price - buy_price) * qty;
    gross - total_fees(buy_price, sell_price, fee_pct, tax_pct) * qty
}

/// Net profit per unit as a percentage of the buy price.
pub fn net_margin_pct(buy_price: f64, sell_price: f64, fee_pct: f64, tax_pct: f64) -> f64 {
    if buy_price <= 0.0 {
        return 0.0;
    }
    net_profit(buy_price, sell_price, 1, fee_pct, tax_pct) / buy_price * 100.0
}

/// Raw spread before fees, percent of the buy price.
pub fn spread_pct(buy_price: f64, sell_price: f64) -> f64 {
    if buy_price <= 0.0 {
        return 0.0;
    }
    (sell_price - buy_price) / buy_price * 100.0
}

/// Fee calculator bound to a configured fee schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeModel {
    pub broker_fee_pct: f64,
    pub sales_tax_pct: f64,
}

impl Default for FeeModel {
    fn default() -> Self {
        Self::from_config(&FeeConfig::default())
    }
}

impl FeeModel {
    pub fn new(broker_fee_pct: f64, sales_tax_pct: f64) -> Self {
        Self {
            broker_fee_pct,
            sales_tax_pct,
        }
    }

    pub fn from_config(cfg: &FeeConfig) -> Self {
        Self::new(cfg.broker_fee_pct, cfg.sales_tax_pct)
    }

    /// Replace only the supplied percentages.
    pub fn with_overrides(&self, broker_fee_pct: Option<f64>, sales_tax_pct: Option<f64>) -> Self {
        Self {
            broker_fee_pct: broker_fee_pct.unwrap_or(self.broker_fee_pct),
            sales_tax_pct: sales_tax_pct.unwrap_or(self.sales_tax_pct),
        }
    }

    pub fn broker_fee(&self, price: f64) -> f64 {
        broker_fee(price, self.broker_fee_pct)
    }

    pub fn sales_tax(&self, price: f64) -> f64 {
        sales_tax(price, self.sales_tax_pct)
    }

    pub fn total_fees(&self, buy_price: f64, sell_price: f64) -> f64 {
        total_fees(buy_price, sell_price, self.broker_fee_pct, self.sales_tax_pct)
    }

    pub fn net_profit(&self, buy_price: f64, sell_price: f64, quantity: i64) -> f64 {
        net_profit(
            buy_price,
            sell_price,
            quantity,
            self.broker_fee_pct,
            self.sales_tax_pct,
        )
    }

    pub fn net_margin_pct(&self, buy_price: f64, sell_price: f64) -> f64 {
        net_margin_pct(buy_price, sell_price, self.broker_fee_pct, self.sales_tax_pct)
    }

    pub fn spread_pct(&self, buy_price: f64, sell_price: f64) -> f64 {
        spread_pct(buy_price, sell_price)
    }
}
