//! CLI output: opportunity table and JSON artifact.

use std::path::{Path, PathBuf};

use arb_engine::ArbitrageSignal;
use chrono::{DateTime, Utc};
use common::{ArbitrageCandidate, Error, ThresholdConfig};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Artifact<'a> {
    pub timestamp: DateTime<Utc>,
    pub params: &'a ThresholdConfig,
    pub run_id: Option<i64>,
    pub count: usize,
    pub opportunities: Vec<ArbitrageSignal>,
}

/// Default artifact path: `artifacts/arbitrage_<YYYYmmdd_HHMM>.json`.
pub fn default_artifact_path(at: DateTime<Utc>) -> PathBuf {
    PathBuf::from("artifacts").join(format!("arbitrage_{}.json", at.format("%Y%m%d_%H%M")))
}

/// Write the shown candidates as JSON. `run_id` is `None` when the pass
/// was not saved.
pub fn write_artifact(
    timestamp: DateTime<Utc>,
    params: &ThresholdConfig,
    run_id: Option<i64>,
    shown: &[ArbitrageCandidate],
    path: &Path,
) -> Result<(), Error> {
    let artifact = Artifact {
        timestamp,
        params,
        run_id,
        count: shown.len(),
        opportunities: shown.iter().map(ArbitrageSignal::from).collect(),
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&artifact)?)?;
    Ok(())
}

pub fn render_table(signals: &[ArbitrageSignal]) -> String {
    let mut out = format!(
        "{:>8}  {:<10} {:<10} {:>12} {:>12} {:>8} {:>10} {:>6}\n",
        "item", "from", "to", "buy", "sell", "margin", "EV (M)", "decay"
    );
    out.push_str(&"-".repeat(84));
    out.push('\n');
    for s in signals {
        out.push_str(&format!(
            "{:>8}  {:<10} {:<10} {:>12.2} {:>12.2} {:>7.2}% {:>10.2} {:>6.1}\n",
            s.item_id,
            s.from_hub,
            s.to_hub,
            s.buy_price,
            s.sell_price,
            s.net_margin_pct,
            s.ev_isk / 1_000_000.0,
            s.decay_score
        ));
    }
    out
}
