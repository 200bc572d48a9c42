//! Shared types, config, and error definitions for eve-arb.

pub mod config;
pub mod error;
pub mod hubs;
pub mod types;

pub use config::{
    DecayWeights, EngineConfig, FeeConfig, ScoringConfig, ThresholdConfig, ThresholdOverrides,
};
pub use error::Error;
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
