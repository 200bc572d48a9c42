//! Arbitrage engine crate.
//!
//! Scores cross-hub routes for EVE Online market items and ranks them by
//! expected value, plus the seams around scoring: market data sources,
//! input validation, the run store, and the analysis pipeline.

pub mod config;
pub mod fees;
pub mod pipeline;
pub mod quotes;
pub mod ranker;
pub mod risk;
pub mod signals;
pub mod source;
pub mod store;
pub mod validate;

pub use config::{PipelineConfig, RetryConfig};
pub use fees::FeeModel;
pub use pipeline::{AnalysisPipeline, AnalysisReport, PipelineError, Stage};
pub use quotes::QuoteBook;
pub use ranker::OpportunityRanker;
pub use risk::{FlatRouteRisk, RouteRisk};
pub use signals::{ArbitrageResponse, ArbitrageSignal, SignalFilter, SignalService};
pub use source::{MarketDataSource, StaticSource};
pub use store::RunStore;
pub use validate::{validate, Rejection};
