//! Quote book. Turns per-hub price quotes into cross-hub route candidates.
//!
//! For each item and each ordered hub pair `(from, to)`:
//! - `buy_price` is the lowest sell-side quote at `from`,
//! - `sell_price` is the highest buy-side quote at `to`,
//! - `liquidity_24h` is the smaller traded value (`Σ price × quantity`) of
//!   the two hubs over the trailing 24h before `as_of`.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use common::{PriceQuote, RawCandidate, Side};
use tracing::debug;

/// Best prices and traded value for one item at one hub.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HubBook {
    /// Lowest standing sell order (what we pay).
    pub best_ask: Option<f64>,
    /// Highest standing buy order (what we receive).
    pub best_bid: Option<f64>,
    /// Traded value within the trailing window.
    pub value_24h: f64,
}

/// Aggregated view of a quote snapshot.
#[derive(Debug, Clone, Default)]
pub struct QuoteBook {
    // BTreeMap keeps route enumeration deterministic.
    books: BTreeMap<(i64, i64), HubBook>,
    history: HashMap<(i64, i64), Vec<f64>>,
}

impl QuoteBook {
    /// Build from quotes; only quotes observed in `(as_of - 24h, as_of]` count.
    pub fn from_quotes(quotes: &[PriceQuote], as_of: DateTime<Utc>) -> Self {
        let window_start = as_of - Duration::hours(24);
        let mut books: BTreeMap<(i64, i64), HubBook> = BTreeMap::new();
        let mut skipped = 0usize;

        for q in quotes {
            if q.observed_at <= window_start || q.observed_at > as_of {
                skipped += 1;
                continue;
            }
            let book = books.entry((q.item_id, q.hub_id)).or_default();
            match q.side {
                Side::Sell => {
                    book.best_ask = Some(book.best_ask.map_or(q.price, |a| a.min(q.price)));
                }
                Side::Buy => {
                    book.best_bid = Some(book.best_bid.map_or(q.price, |b| b.max(q.price)));
                }
            }
            book.value_24h += q.price * q.quantity as f64;
        }

        if skipped > 0 {
            debug!("Quote book skipped {} quotes outside the 24h window", skipped);
        }

        Self {
            books,
            history: HashMap::new(),
        }
    }

    /// Attach a price history for `(item_id, hub_id)`.
    pub fn with_history(mut self, item_id: i64, hub_id: i64, prices: Vec<f64>) -> Self {
        self.history.insert((item_id, hub_id), prices);
        self
    }

    pub fn book(&self, item_id: i64, hub_id: i64) -> Option<&HubBook> {
        self.books.get(&(item_id, hub_id))
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Every ordered hub pair that has an ask at `from` and a bid at `to`.
    ///
    /// Routes are emitted regardless of spread; validation drops the rest.
    pub fn candidates(&self) -> Vec<RawCandidate> {
        let mut by_item: BTreeMap<i64, Vec<(i64, &HubBook)>> = BTreeMap::new();
        for ((item_id, hub_id), book) in &self.books {
            by_item.entry(*item_id).or_default().push((*hub_id, book));
        }

        let mut out = Vec::new();
        for (item_id, hubs) in by_item {
            for (from_hub, from_book) in &hubs {
                let Some(buy_price) = from_book.best_ask else {
                    continue;
                };
                for (to_hub, to_book) in &hubs {
                    if from_hub == to_hub {
                        continue;
                    }
                    let Some(sell_price) = to_book.best_bid else {
                        continue;
                    };
                    let liquidity = from_book.value_24h.min(to_book.value_24h);
                    let history = self
                        .history
                        .get(&(item_id, *to_hub))
                        .cloned()
                        .unwrap_or_default();
                    out.push(
                        RawCandidate::new(
                            item_id, *from_hub, *to_hub, buy_price, sell_price, liquidity,
                        )
                        .with_price_history(history),
                    );
                }
            }
        }
        out
    }
}
