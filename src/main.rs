//! eve-arb entry point.
//!
//! Subcommands:
//! 1. `find-arb`: one pass, print the table, write a JSON artifact
//! 2. `worker`: scheduled passes, each non-empty result persisted
//! 3. `serve`: HTTP API over the run store
//! 4. `signals`: print the latest stored signals

mod api;
mod config;
mod report;
mod source;
mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arb_engine::signals::clamp_limit;
use arb_engine::{AnalysisPipeline, ArbitrageSignal, SignalFilter, SignalService, Stage};
use chrono::Utc;
use clap::{Parser, Subcommand};
use common::{Error, ThresholdOverrides};
use tokio::net::TcpListener;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::{load_config, AppConfig};
use crate::source::SnapshotFileSource;
use crate::store::SqliteRunStore;

#[derive(Parser)]
#[command(name = "eve-arb", about = "Cross-hub arbitrage signals for EVE Online markets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one analysis pass and report the opportunities.
    FindArb {
        /// Minimum expected value in ISK.
        #[arg(long)]
        min_ev: Option<f64>,

        /// Minimum net margin, percent.
        #[arg(long)]
        min_margin: Option<f64>,

        /// Minimum trailing 24h liquidity in ISK.
        #[arg(long)]
        min_liquidity: Option<f64>,

        /// Rows to print and export.
        #[arg(long)]
        limit: Option<usize>,

        /// Artifact path (default: artifacts/arbitrage_<timestamp>.json).
        #[arg(long)]
        output_file: Option<PathBuf>,

        /// Record the run in the database.
        #[arg(long)]
        save_db: bool,
    },

    /// Run analysis passes on a fixed interval until Ctrl-C.
    Worker,

    /// Serve the HTTP API.
    Serve,

    /// Print signals from the latest completed run.
    Signals {
        #[arg(long)]
        min_ev: Option<f64>,

        #[arg(long)]
        min_margin: Option<f64>,

        #[arg(long)]
        limit: Option<usize>,
    },
}

fn build_pipeline(cfg: &AppConfig, with_store: bool) -> Result<AnalysisPipeline, Error> {
    let source = Arc::new(SnapshotFileSource::new(&cfg.source.snapshot_path));
    let pipeline = AnalysisPipeline::new(source, &cfg.engine, cfg.pipeline);
    if !with_store {
        return Ok(pipeline);
    }
    let store = SqliteRunStore::open(&cfg.storage.db_path)?;
    Ok(pipeline.with_store(Arc::new(store)))
}

async fn find_arb(
    cfg: &AppConfig,
    overrides: ThresholdOverrides,
    limit: Option<usize>,
    output_file: Option<PathBuf>,
    save_db: bool,
) -> Result<(), Error> {
    let pipeline = build_pipeline(cfg, save_db)?;
    report_pass(&pipeline, &overrides, limit, output_file, save_db).await
}

/// Run one pass, print the table and write the artifact.
///
/// A persist failure still reports the scored candidates (with no run id)
/// before the error is returned.
async fn report_pass(
    pipeline: &AnalysisPipeline,
    overrides: &ThresholdOverrides,
    limit: Option<usize>,
    output_file: Option<PathBuf>,
    persist: bool,
) -> Result<(), Error> {
    let thresholds = pipeline.thresholds().with_overrides(overrides);
    let mut failure = None;

    let (candidates, run_id, finished_at) = match pipeline.run_once(overrides, persist).await {
        Ok(outcome) => {
            info!(
                "{} opportunities ({} fetched, {} rejected)",
                outcome.candidates.len(),
                outcome.fetched,
                outcome.rejected
            );
            let run_id = outcome.run_id();
            (outcome.candidates, run_id, outcome.finished_at)
        }
        Err(e) if e.stage() == Stage::Persist => {
            error!("Pass failed at {} stage: {}; results were not saved", e.stage(), e);
            failure = Some(Error::Storage(e.to_string()));
            (e.into_candidates(), None, Utc::now())
        }
        Err(e) => return Err(e.into()),
    };

    let shown = &candidates[..clamp_limit(limit).min(candidates.len())];
    info!("Showing {} of {}", shown.len(), candidates.len());

    if shown.is_empty() {
        println!("No opportunities above thresholds.");
    } else {
        let signals: Vec<ArbitrageSignal> = shown.iter().map(ArbitrageSignal::from).collect();
        print!("{}", report::render_table(&signals));
    }

    let path = output_file.unwrap_or_else(|| report::default_artifact_path(finished_at));
    report::write_artifact(finished_at, &thresholds, run_id, shown, &path)?;
    info!("Artifact written to {}", path.display());

    if let Some(run_id) = run_id {
        info!("Saved as run {}", run_id);
    }
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn run_worker(cfg: &AppConfig) -> Result<(), Error> {
    let pipeline = build_pipeline(cfg, true)?;
    let mut ticker = interval(Duration::from_secs(cfg.worker.interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    if !cfg.worker.run_on_startup {
        // First tick fires immediately.
        ticker.tick().await;
    }

    info!(
        "Worker started: every {}s, source={}",
        cfg.worker.interval_secs,
        cfg.source.snapshot_path.display()
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Ctrl-C received, worker stopping");
                break;
            }
            _ = ticker.tick() => {
                let started = Utc::now();
                match pipeline.run_once(&ThresholdOverrides::default(), true).await {
                    Ok(report) => info!(
                        "Pass done in {}ms: {} opportunities, run={:?}",
                        (report.finished_at - started).num_milliseconds(),
                        report.candidates.len(),
                        report.run_id()
                    ),
                    Err(e) => error!("Pass failed at {} stage: {}", e.stage(), e),
                }
            }
        }
    }
    Ok(())
}

async fn serve(cfg: &AppConfig) -> Result<(), Error> {
    let pipeline = build_pipeline(cfg, true)?;
    let app = api::router(SignalService::new(Arc::new(pipeline)));

    let addr = format!("{}:{}", cfg.api.host, cfg.api.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Ctrl-C handler failed: {}", e);
            }
        })
        .await?;
    Ok(())
}

fn print_signals(
    cfg: &AppConfig,
    filter: SignalFilter,
    limit: Option<usize>,
) -> Result<(), Error> {
    let service = SignalService::new(Arc::new(build_pipeline(cfg, true)?));
    let response = service.latest_signals(&filter, limit)?;

    match response.run_id {
        Some(run_id) => println!("Run {} ({} signals)", run_id, response.count),
        None => {
            println!("No completed runs yet.");
            return Ok(());
        }
    }
    print!("{}", report::render_table(&response.signals));
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eve_arb=info,arb_engine=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = match load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Config error: {}", e);
            std::process::exit(2);
        }
    };
    info!(
        "Engine config: broker_fee={}% sales_tax={}% min_ev={} min_margin={}% min_liquidity={}",
        cfg.engine.fees.broker_fee_pct,
        cfg.engine.fees.sales_tax_pct,
        cfg.engine.thresholds.min_ev,
        cfg.engine.thresholds.min_margin_pct,
        cfg.engine.thresholds.min_liquidity
    );

    let result = match cli.command {
        Command::FindArb {
            min_ev,
            min_margin,
            min_liquidity,
            limit,
            output_file,
            save_db,
        } => {
            let overrides = ThresholdOverrides {
                min_ev,
                min_margin_pct: min_margin,
                min_liquidity,
            };
            find_arb(&cfg, overrides, limit, output_file, save_db).await
        }
        Command::Worker => run_worker(&cfg).await,
        Command::Serve => serve(&cfg).await,
        Command::Signals {
            min_ev,
            min_margin,
            limit,
        } => print_signals(
            &cfg,
            SignalFilter {
                min_ev,
                min_margin_pct: min_margin,
            },
            limit,
        ),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}
