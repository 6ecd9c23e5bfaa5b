//! Fixed-fractional equity from R multiples.
//!
//! Each trade risks `risk_per_trade` of current equity, so equity evolves as
//! `eq *= 1 + risk * R`. A multiplier at or below zero is ruin: equity is 0
//! from that trade on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PortfolioError {
    #[error("years must be > 0, got {0}")]
    NonPositiveYears(f64),
    #[error("start equity must be > 0, got {0}")]
    NonPositiveStart(f64),
}

/// Outcome of one equity path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathStats {
    pub maxdd_pct: f64,
    pub cagr: f64,
    pub final_equity: f64,
    pub blew_up: bool,
}

/// Equity after each trade, starting value included (length `r.len() + 1`).
pub fn equity_curve_from_r(r: &[f64], risk_per_trade: f64, start_equity: f64) -> Vec<f64> {
    let mut eq = Vec::with_capacity(r.len() + 1);
    eq.push(start_equity);
    let mut current = start_equity;
    for &x in r {
        let mult = 1.0 + risk_per_trade * x;
        if mult <= 0.0 {
            eq.resize(r.len() + 1, 0.0);
            return eq;
        }
        current *= mult;
        eq.push(current);
    }
    eq
}

/// Largest fall from a running peak as a fraction of that peak, in [0, 1].
pub fn max_drawdown_pct(equity: &[f64]) -> f64 {
    if equity.len() <= 1 {
        return 0.0;
    }
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &e in equity {
        peak = peak.max(e);
        if peak > 0.0 {
            let dd = (peak - e) / peak;
            if dd.is_finite() {
                worst = worst.max(dd);
            }
        }
    }
    worst.clamp(0.0, 1.0)
}

/// Compound annual growth rate; -1.0 when the path ends at or below zero.
pub fn cagr_from_equity(start_equity: f64, end_equity: f64, years: f64) -> Result<f64, PortfolioError> {
    if years <= 0.0 || years.is_nan() {
        return Err(PortfolioError::NonPositiveYears(years));
    }
    if end_equity <= 0.0 {
        return Ok(-1.0);
    }
    if start_equity <= 0.0 {
        return Err(PortfolioError::NonPositiveStart(start_equity));
    }
    Ok((end_equity / start_equity).powf(1.0 / years) - 1.0)
}

/// Drawdown, CAGR and ruin flag for one R sequence.
pub fn path_stats_from_r(
    r: &[f64],
    risk_per_trade: f64,
    years: f64,
    start_equity: f64,
) -> Result<PathStats, PortfolioError> {
    let eq = equity_curve_from_r(r, risk_per_trade, start_equity);
    let final_equity = eq.last().copied().unwrap_or(start_equity);
    Ok(PathStats {
        maxdd_pct: max_drawdown_pct(&eq),
        cagr: cagr_from_equity(start_equity, final_equity, years)?,
        final_equity,
        blew_up: final_equity <= 0.0,
    })
}
