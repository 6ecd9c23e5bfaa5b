//! Walk-forward evaluation: rolling in-sample / out-of-sample windows.
//!
//! Sessions are split into consecutive windows of `is_days` in-sample
//! sessions followed by `oos_days` out-of-sample sessions, advancing by
//! `step` sessions (default `oos_days`). Features are attached once over the
//! full history (they are causal); signals and simulation then run on each
//! window's bar slice independently, so no state crosses a window boundary.

use std::ops::Range;

use chrono::{NaiveDate, NaiveDateTime};
use s3a_core::domain::{sessions, Bar, Session, Trade};
use s3a_core::{attach_features, StrategyConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::metrics::{equity_curve_r, Summary};
use crate::runner::{run_on_featured, RunError};

#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error("{field} must be > 0")]
    NonPositive { field: &'static str },
    #[error(transparent)]
    Run(#[from] RunError),
}

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    pub is_days: usize,
    pub oos_days: usize,
    /// Sessions to advance between windows; `None` means `oos_days`.
    pub step: Option<usize>,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            is_days: 63,
            oos_days: 21,
            step: None,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// One window, as session index ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    pub window_id: usize,
    pub is_sessions: Range<usize>,
    pub oos_sessions: Range<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowReport {
    pub window_id: usize,
    pub is_start: NaiveDate,
    pub is_end: NaiveDate,
    pub oos_start: NaiveDate,
    pub oos_end: NaiveDate,
    pub is_summary: Summary,
    pub oos_summary: Summary,
}

/// A trade tagged with the window and regime it came from.
#[derive(Debug, Clone, Serialize)]
pub struct WindowTrade {
    pub window_id: usize,
    pub regime: Regime,
    #[serde(flatten)]
    pub trade: Trade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Regime {
    #[serde(rename = "IS")]
    InSample,
    #[serde(rename = "OOS")]
    OutOfSample,
}

/// Out-of-sample cumulative R, restarting at each window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity_r: f64,
    pub window_id: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalkForwardResult {
    pub windows: Vec<WindowReport>,
    pub is_trades: Vec<WindowTrade>,
    pub oos_trades: Vec<WindowTrade>,
    pub oos_equity: Vec<EquityPoint>,
}

/// Rolling windows over `n_sessions`. Windows that would run past the end
/// are not emitted.
pub fn rolling_windows(n_sessions: usize, config: &WalkForwardConfig) -> Result<Vec<WindowSpec>, WalkForwardError> {
    if config.is_days == 0 {
        return Err(WalkForwardError::NonPositive { field: "is_days" });
    }
    if config.oos_days == 0 {
        return Err(WalkForwardError::NonPositive { field: "oos_days" });
    }
    let step = config.step.unwrap_or(config.oos_days);
    if step == 0 {
        return Err(WalkForwardError::NonPositive { field: "step" });
    }

    let mut out = Vec::new();
    let mut i = 0;
    while i + config.is_days + config.oos_days <= n_sessions {
        let is_end = i + config.is_days;
        out.push(WindowSpec {
            window_id: out.len(),
            is_sessions: i..is_end,
            oos_sessions: is_end..is_end + config.oos_days,
        });
        i += step;
    }
    Ok(out)
}

/// Run the full walk-forward over raw bars.
pub fn run_walk_forward(
    mut bars: Vec<Bar>,
    cfg: &StrategyConfig,
    config: &WalkForwardConfig,
) -> Result<WalkForwardResult, WalkForwardError> {
    cfg.validate().map_err(RunError::from)?;
    attach_features(&mut bars, &cfg.features).map_err(RunError::from)?;
    let all = sessions(&bars).map_err(RunError::from)?;
    let windows = rolling_windows(all.len(), config)?;
    info!(sessions = all.len(), windows = windows.len(), "walk-forward plan");

    let mut result = WalkForwardResult {
        windows: Vec::with_capacity(windows.len()),
        is_trades: Vec::new(),
        oos_trades: Vec::new(),
        oos_equity: Vec::new(),
    };

    for w in &windows {
        let is_slice = &bars[bar_range(&all, &w.is_sessions)];
        let oos_slice = &bars[bar_range(&all, &w.oos_sessions)];
        let (_, is_trades) = run_on_featured(is_slice, cfg)?;
        let (_, oos_trades) = run_on_featured(oos_slice, cfg)?;
        debug!(
            window = w.window_id,
            is_trades = is_trades.len(),
            oos_trades = oos_trades.len(),
            "window complete"
        );

        let curve = equity_curve_r(&oos_trades);
        result.oos_equity.extend(oos_trades.iter().zip(curve).map(|(t, equity_r)| EquityPoint {
            timestamp: t.exit_time,
            equity_r,
            window_id: w.window_id,
        }));

        result.windows.push(WindowReport {
            window_id: w.window_id,
            is_start: all[w.is_sessions.start].date,
            is_end: all[w.is_sessions.end - 1].date,
            oos_start: all[w.oos_sessions.start].date,
            oos_end: all[w.oos_sessions.end - 1].date,
            is_summary: Summary::compute(&is_trades),
            oos_summary: Summary::compute(&oos_trades),
        });
        result.is_trades.extend(tag(is_trades, w.window_id, Regime::InSample));
        result.oos_trades.extend(tag(oos_trades, w.window_id, Regime::OutOfSample));
    }

    // Stable: equal timestamps keep window order.
    result
        .oos_equity
        .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.window_id.cmp(&b.window_id)));
    Ok(result)
}

/// Bar index range covering a contiguous run of sessions.
fn bar_range(all: &[Session], window: &Range<usize>) -> Range<usize> {
    all[window.start].first()..all[window.end - 1].range.end
}

fn tag(trades: Vec<Trade>, window_id: usize, regime: Regime) -> impl Iterator<Item = WindowTrade> {
    trades.into_iter().map(move |trade| WindowTrade {
        window_id,
        regime,
        trade,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_roll_by_oos_length_by_default() {
        let cfg = WalkForwardConfig {
            is_days: 4,
            oos_days: 2,
            step: None,
        };
        let w = rolling_windows(10, &cfg).unwrap();
        assert_eq!(w.len(), 3);
        assert_eq!(w[0].is_sessions, 0..4);
        assert_eq!(w[0].oos_sessions, 4..6);
        assert_eq!(w[2].is_sessions, 4..8);
        assert_eq!(w[2].oos_sessions, 8..10);
    }

    #[test]
    fn custom_step_and_short_history() {
        let cfg = WalkForwardConfig {
            is_days: 3,
            oos_days: 1,
            step: Some(1),
        };
        assert_eq!(rolling_windows(6, &cfg).unwrap().len(), 3);
        assert!(rolling_windows(3, &cfg).unwrap().is_empty());
    }

    #[test]
    fn zero_sizes_are_rejected() {
        for cfg in [
            WalkForwardConfig { is_days: 0, ..WalkForwardConfig::default() },
            WalkForwardConfig { oos_days: 0, ..WalkForwardConfig::default() },
            WalkForwardConfig { step: Some(0), ..WalkForwardConfig::default() },
        ] {
            assert!(matches!(rolling_windows(100, &cfg), Err(WalkForwardError::NonPositive { .. })));
        }
    }
}
