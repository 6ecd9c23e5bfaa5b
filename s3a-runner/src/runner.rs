//! Backtest runner: wires features, signals, simulation and metrics.
//!
//! Two entry points:
//! - `run_backtest()`: raw bars in, features attached here. Used by the CLI.
//! - `run_on_featured()`: bars that already carry features. Used by
//!   walk-forward, which attaches features once over the full history.

use s3a_core::domain::{Bar, BarError, Trade};
use s3a_core::signals::SignalRow;
use s3a_core::{attach_features, generate_signals, simulate_trades, ConfigError, EngineError, StrategyConfig};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::metrics::Summary;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("bar data error: {0}")]
    Bars(#[from] BarError),
    #[error("simulation error: {0}")]
    Engine(#[from] EngineError),
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    /// Input bars with features attached.
    #[serde(skip)]
    pub bars: Vec<Bar>,
    #[serde(skip)]
    pub signals: Vec<SignalRow>,
    pub trades: Vec<Trade>,
    pub summary: Summary,
    pub session_count: usize,
}

/// Attach features, then run signals, simulation and metrics.
pub fn run_backtest(mut bars: Vec<Bar>, cfg: &StrategyConfig) -> Result<BacktestResult, RunError> {
    cfg.validate()?;
    attach_features(&mut bars, &cfg.features)?;
    let (signals, trades) = run_on_featured(&bars, cfg)?;
    let summary = Summary::compute(&trades);
    let session_count = s3a_core::domain::sessions(&bars)?.len();
    info!(
        bars = bars.len(),
        sessions = session_count,
        trades = summary.trades,
        sum_r = summary.sum_r,
        "backtest complete"
    );
    Ok(BacktestResult {
        bars,
        signals,
        trades,
        summary,
        session_count,
    })
}

/// Signals and trades for bars whose features are already attached.
///
/// Bars without features degrade to default signal rows (logged by
/// `generate_signals`) and produce no trades.
pub fn run_on_featured(bars: &[Bar], cfg: &StrategyConfig) -> Result<(Vec<SignalRow>, Vec<Trade>), RunError> {
    let signals = generate_signals(bars, cfg)?;
    let trades = simulate_trades(bars, &signals, cfg)?;
    Ok((signals, trades))
}
