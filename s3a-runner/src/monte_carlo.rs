//! Monte Carlo resampling of a realized-R trade series.
//!
//! Each path redraws `n` trades from the observed R multiples and runs them
//! through fixed-fractional compounding. Two sampling schemes:
//! - IID bootstrap: every draw independent
//! - Circular block bootstrap: random block starts, `block_size` consecutive
//!   trades per block (wrapping), which keeps win/loss clustering intact
//!
//! Paths come from one seeded `StdRng` stream, generated sequentially, so a
//! given seed always reproduces the same samples.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use s3a_core::domain::Trade;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::quantile_sorted;
use crate::portfolio::{equity_curve_from_r, path_stats_from_r, PortfolioError};

#[derive(Debug, Error, PartialEq)]
pub enum MonteCarloError {
    #[error("seed is required for deterministic Monte Carlo (pass --seed)")]
    MissingSeed,
    #[error("n_paths must be > 0")]
    NoPaths,
    #[error("block_size must be > 0")]
    ZeroBlockSize,
    #[error("could not infer years from trade timestamps; pass years explicitly")]
    UnknownYears,
    #[error(transparent)]
    Portfolio(#[from] PortfolioError),
}

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    pub n_paths: usize,
    pub risk_per_trade: f64,
    /// `None` selects the IID bootstrap.
    pub block_size: Option<usize>,
    pub seed: Option<u64>,
    /// Calendar span for CAGR; inferred from trade timestamps when absent.
    pub years: Option<f64>,
    pub keep_equity_paths: bool,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            n_paths: 1000,
            risk_per_trade: 0.01,
            block_size: None,
            seed: None,
            years: None,
            keep_equity_paths: false,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub n_trades: usize,
    pub n_paths: usize,
    pub risk_per_trade: f64,
    pub block_size: Option<usize>,
    pub seed: Option<u64>,
    pub years: Option<f64>,
    pub blowup_rate: f64,
    pub median_cagr: f64,
    pub maxdd_pct_p05: f64,
    pub maxdd_pct_p50: f64,
    pub maxdd_pct_p95: f64,
}

/// Per-path statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathSample {
    pub path_id: usize,
    pub maxdd_pct: f64,
    pub cagr: f64,
    pub final_equity: f64,
    pub blew_up: bool,
}

#[derive(Debug, Clone)]
pub struct MonteCarloResult {
    pub summary: MonteCarloSummary,
    pub samples: Vec<PathSample>,
    /// One equity curve per path (`n_trades + 1` points), when requested.
    pub equity_paths: Option<Vec<Vec<f64>>>,
}

/// Run the simulation over the trades' realized R.
pub fn simulate(trades: &[Trade], config: &MonteCarloConfig) -> Result<MonteCarloResult, MonteCarloError> {
    let seed = config.seed.ok_or(MonteCarloError::MissingSeed)?;
    if config.n_paths == 0 {
        return Err(MonteCarloError::NoPaths);
    }
    if config.block_size == Some(0) {
        return Err(MonteCarloError::ZeroBlockSize);
    }

    let r: Vec<f64> = trades
        .iter()
        .map(|t| if t.realized_r.is_finite() { t.realized_r } else { 0.0 })
        .collect();
    let n = r.len();
    if n == 0 {
        return Ok(MonteCarloResult {
            summary: MonteCarloSummary {
                n_trades: 0,
                n_paths: config.n_paths,
                risk_per_trade: config.risk_per_trade,
                block_size: config.block_size,
                seed: Some(seed),
                years: config.years,
                blowup_rate: 0.0,
                median_cagr: 0.0,
                maxdd_pct_p05: 0.0,
                maxdd_pct_p50: 0.0,
                maxdd_pct_p95: 0.0,
            },
            samples: Vec::new(),
            equity_paths: None,
        });
    }

    let years = config
        .years
        .or_else(|| infer_years(trades))
        .ok_or(MonteCarloError::UnknownYears)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut samples = Vec::with_capacity(config.n_paths);
    let mut equity_paths = config.keep_equity_paths.then(|| Vec::with_capacity(config.n_paths));

    for path_id in 0..config.n_paths {
        let idx = match config.block_size {
            None => iid_indices(&mut rng, n),
            Some(block) => block_indices(&mut rng, n, block),
        };
        let path: Vec<f64> = idx.iter().map(|&i| r[i]).collect();
        let stats = path_stats_from_r(&path, config.risk_per_trade, years, 1.0)?;
        samples.push(PathSample {
            path_id,
            maxdd_pct: stats.maxdd_pct,
            cagr: stats.cagr,
            final_equity: stats.final_equity,
            blew_up: stats.blew_up,
        });
        if let Some(paths) = equity_paths.as_mut() {
            paths.push(equity_curve_from_r(&path, config.risk_per_trade, 1.0));
        }
    }

    let mut dd: Vec<f64> = samples.iter().map(|s| s.maxdd_pct).collect();
    let mut cagr: Vec<f64> = samples.iter().map(|s| s.cagr).collect();
    dd.sort_by(f64::total_cmp);
    cagr.sort_by(f64::total_cmp);
    let blowups = samples.iter().filter(|s| s.blew_up).count();

    Ok(MonteCarloResult {
        summary: MonteCarloSummary {
            n_trades: n,
            n_paths: config.n_paths,
            risk_per_trade: config.risk_per_trade,
            block_size: config.block_size,
            seed: Some(seed),
            years: Some(years),
            blowup_rate: blowups as f64 / samples.len() as f64,
            median_cagr: quantile_sorted(&cagr, 0.50),
            maxdd_pct_p05: quantile_sorted(&dd, 0.05),
            maxdd_pct_p50: quantile_sorted(&dd, 0.50),
            maxdd_pct_p95: quantile_sorted(&dd, 0.95),
        },
        samples,
        equity_paths,
    })
}

/// Calendar span from the earliest entry to the latest exit, in years of
/// 365.25 days. `None` when the span is empty.
pub fn infer_years(trades: &[Trade]) -> Option<f64> {
    let start = trades.iter().map(|t| t.entry_time).min()?;
    let end = trades.iter().map(|t| t.exit_time).max()?;
    if end <= start {
        return None;
    }
    let days = (end - start).num_seconds() as f64 / 86_400.0;
    Some(days / 365.25)
}

// ─── Resampling ──────────────────────────────────────────────────────

fn iid_indices(rng: &mut StdRng, n: usize) -> Vec<usize> {
    (0..n).map(|_| rng.gen_range(0..n)).collect()
}

/// Circular block bootstrap indices, truncated to length `n`.
fn block_indices(rng: &mut StdRng, n: usize, block_size: usize) -> Vec<usize> {
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let start = rng.gen_range(0..n);
        out.extend((0..block_size).map(|k| (start + k) % n).take(n - out.len()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tests::trade;
    use chrono::NaiveDate;

    fn year_of_trades(rs: &[f64]) -> Vec<Trade> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 3).unwrap().and_hms_opt(10, 0, 0).unwrap();
        rs.iter()
            .enumerate()
            .map(|(i, &r)| trade(start + chrono::Duration::days(i as i64 * 3), r))
            .collect()
    }

    fn seeded(seed: u64) -> MonteCarloConfig {
        MonteCarloConfig {
            n_paths: 200,
            seed: Some(seed),
            ..MonteCarloConfig::default()
        }
    }

    #[test]
    fn seed_is_required() {
        let err = simulate(&year_of_trades(&[1.0]), &MonteCarloConfig::default()).unwrap_err();
        assert_eq!(err, MonteCarloError::MissingSeed);
    }

    #[test]
    fn zero_paths_and_zero_block_are_rejected() {
        let trades = year_of_trades(&[1.0, -1.0]);
        let cfg = MonteCarloConfig { n_paths: 0, ..seeded(1) };
        assert_eq!(simulate(&trades, &cfg).unwrap_err(), MonteCarloError::NoPaths);
        let cfg = MonteCarloConfig { block_size: Some(0), ..seeded(1) };
        assert_eq!(simulate(&trades, &cfg).unwrap_err(), MonteCarloError::ZeroBlockSize);
    }

    #[test]
    fn same_seed_same_samples() {
        let trades = year_of_trades(&[1.5, -1.0, 2.0, -1.0, 0.5, -0.2, 1.0]);
        let a = simulate(&trades, &seeded(7)).unwrap();
        let b = simulate(&trades, &seeded(7)).unwrap();
        assert_eq!(a.samples, b.samples);
        assert_eq!(a.summary, b.summary);
        let c = simulate(&trades, &seeded(8)).unwrap();
        assert_ne!(a.samples, c.samples);
    }

    #[test]
    fn no_trades_gives_zero_summary() {
        let out = simulate(&[], &seeded(3)).unwrap();
        assert_eq!(out.summary.n_trades, 0);
        assert_eq!(out.summary.blowup_rate, 0.0);
        assert!(out.samples.is_empty());
    }

    #[test]
    fn all_winners_never_blow_up() {
        let trades = year_of_trades(&[1.0; 20]);
        let out = simulate(&trades, &seeded(11)).unwrap();
        assert_eq!(out.summary.blowup_rate, 0.0);
        assert_eq!(out.summary.maxdd_pct_p95, 0.0);
        assert!(out.summary.median_cagr > 0.0);
    }

    #[test]
    fn oversized_risk_blows_up_every_path_of_losers() {
        let trades = year_of_trades(&[-1.0; 5]);
        let cfg = MonteCarloConfig {
            risk_per_trade: 1.0,
            ..seeded(5)
        };
        let out = simulate(&trades, &cfg).unwrap();
        assert_eq!(out.summary.blowup_rate, 1.0);
        assert_eq!(out.summary.median_cagr, -1.0);
    }

    #[test]
    fn equity_paths_kept_on_request() {
        let trades = year_of_trades(&[1.0, -1.0, 0.5]);
        let cfg = MonteCarloConfig {
            n_paths: 4,
            keep_equity_paths: true,
            block_size: Some(2),
            ..seeded(9)
        };
        let out = simulate(&trades, &cfg).unwrap();
        let paths = out.equity_paths.unwrap();
        assert_eq!(paths.len(), 4);
        assert!(paths.iter().all(|p| p.len() == 4 && p[0] == 1.0));
    }

    #[test]
    fn block_indices_wrap_and_truncate() {
        let mut rng = StdRng::seed_from_u64(42);
        let idx = block_indices(&mut rng, 5, 3);
        assert_eq!(idx.len(), 5);
        assert_eq!(idx[1], (idx[0] + 1) % 5);
        assert_eq!(idx[2], (idx[0] + 2) % 5);
    }

    #[test]
    fn years_span_entry_to_exit() {
        let trades = year_of_trades(&[1.0, 1.0]);
        let years = infer_years(&trades).unwrap();
        let expected = (3.0 * 86_400.0 + 20.0 * 60.0) / 86_400.0 / 365.25;
        assert!((years - expected).abs() < 1e-12);
        assert!(infer_years(&[]).is_none());
    }
}
