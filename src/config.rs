//! Configuration loader. Merges env vars, .env file, and config.toml.

use std::path::{Path, PathBuf};

use arb_engine::config::PipelineConfig;
use common::{EngineConfig, Error};
use serde::{Deserialize, Serialize};

// ── App config types ──────────────────────────────────────────────────

/// Top-level eve-arb configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Fees, thresholds, scoring constants.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Retry and validation around the engine.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// JSON market snapshot written by the ingester.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Seconds between scheduled passes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

fn default_true() -> bool {
    true
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/eve_arb.db")
}
fn default_snapshot_path() -> PathBuf {
    PathBuf::from("data/market_snapshot.json")
}
fn default_api_host() -> String {
    "127.0.0.1".into()
}
fn default_api_port() -> u16 {
    8080
}
fn default_interval_secs() -> u64 {
    4 * 60 * 60
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            run_on_startup: true,
        }
    }
}

// ── Config loader ─────────────────────────────────────────────────────

/// Load configuration from environment and optional config file.
pub fn load_config() -> Result<AppConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = AppConfig::default();

    // 3. Try loading config.toml (or $EVE_ARB_CONFIG) if it exists.
    let config_path = std::env::var("EVE_ARB_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));
    if config_path.exists() {
        config = read_config_file(&config_path)?;
    }

    // 4. Override with environment variables (highest priority).
    apply_env(&mut config, |key| std::env::var(key).ok())?;

    // 5. Validate.
    validate(&config)?;

    Ok(config)
}

fn read_config_file(path: &Path) -> Result<AppConfig, Error> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, Error> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has an invalid value: {:?}", key, raw)))
}

/// Apply environment overrides through `lookup`.
pub fn apply_env<F>(config: &mut AppConfig, lookup: F) -> Result<(), Error>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("BROKER_FEE_PCT") {
        config.engine.fees.broker_fee_pct = parse_var("BROKER_FEE_PCT", &v)?;
    }
    if let Some(v) = lookup("SALES_TAX_PCT") {
        config.engine.fees.sales_tax_pct = parse_var("SALES_TAX_PCT", &v)?;
    }
    if let Some(v) = lookup("MIN_LIQUIDITY_ISK_24H") {
        config.engine.thresholds.min_liquidity = parse_var("MIN_LIQUIDITY_ISK_24H", &v)?;
    }
    if let Some(v) = lookup("MIN_EV_ISK") {
        config.engine.thresholds.min_ev = parse_var("MIN_EV_ISK", &v)?;
    }
    if let Some(v) = lookup("MIN_NET_MARGIN_PCT") {
        config.engine.thresholds.min_margin_pct = parse_var("MIN_NET_MARGIN_PCT", &v)?;
    }
    if let Some(v) = lookup("DATABASE_PATH") {
        config.storage.db_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("MARKET_SNAPSHOT_PATH") {
        config.source.snapshot_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("API_HOST") {
        config.api.host = v;
    }
    if let Some(v) = lookup("API_PORT") {
        config.api.port = parse_var("API_PORT", &v)?;
    }
    if let Some(v) = lookup("ANALYTICS_INTERVAL_SECS") {
        config.worker.interval_secs = parse_var("ANALYTICS_INTERVAL_SECS", &v)?;
    }
    Ok(())
}

// NaN fails too.
fn non_negative(v: f64) -> bool {
    v >= 0.0
}

pub fn validate(config: &AppConfig) -> Result<(), Error> {
    let fees = &config.engine.fees;
    if !non_negative(fees.broker_fee_pct) || !non_negative(fees.sales_tax_pct) {
        return Err(Error::Config(
            "broker_fee_pct and sales_tax_pct must be non-negative".into(),
        ));
    }

    let t = &config.engine.thresholds;
    if ![t.min_ev, t.min_margin_pct, t.min_liquidity]
        .into_iter()
        .all(non_negative)
    {
        return Err(Error::Config("thresholds must be non-negative".into()));
    }

    let rate = config.engine.scoring.capture_rate;
    if !(rate > 0.0 && rate <= 1.0) {
        return Err(Error::Config(format!(
            "capture_rate must be in (0, 1], got {}",
            rate
        )));
    }

    if config.worker.interval_secs == 0 {
        return Err(Error::Config("worker.interval_secs must be positive".into()));
    }
    if config.pipeline.retry.max_attempts == 0 {
        return Err(Error::Config("pipeline.retry.max_attempts must be at least 1".into()));
    }

    Ok(())
}
