//! S3A Runner: everything around the core engine that touches files or
//! aggregates results.
//!
//! This crate builds on `s3a-core` to provide:
//! - Minute-bar loading from CSV or Parquet with time-zone handling and RTH slicing
//! - Strategy config loading from TOML
//! - Single-backtest runner (features, signals, trades, metrics)
//! - R-multiple metrics and grouped breakdowns
//! - Fixed-fractional portfolio math and Monte Carlo resampling
//! - Rolling walk-forward evaluation
//! - Artifact export and run metadata

pub mod config_loader;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod monte_carlo;
pub mod portfolio;
pub mod run_meta;
pub mod runner;
pub mod walk_forward;

pub use config_loader::{load_config, ConfigLoadError};
pub use data_loader::{load_bars, LoadError, LoadOptions, LoadedData};
pub use export::ExportError;
pub use metrics::{grouped_summary, GroupBy, Summary};
pub use monte_carlo::{MonteCarloConfig, MonteCarloError, MonteCarloResult, MonteCarloSummary};
pub use portfolio::{PathStats, PortfolioError};
pub use run_meta::{new_run_id, RunMeta};
pub use runner::{run_backtest, BacktestResult, RunError};
pub use walk_forward::{run_walk_forward, WalkForwardConfig, WalkForwardError, WalkForwardResult};
