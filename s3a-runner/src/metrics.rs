//! Trade-log metrics in R units: pure functions, trade list in, numbers out.
//!
//! Every metric reads `realized_r` (non-finite values count as 0) and, for
//! time-based slicing, `entry_time`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Datelike;
use s3a_core::domain::Trade;
use serde::{Deserialize, Serialize};

/// Aggregate statistics for one trade list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub trades: usize,
    pub win_rate: f64,
    pub avg_r: f64,
    pub expectancy_r: f64,
    pub avg_win_r: f64,
    pub avg_loss_r: f64,
    pub sum_r: f64,
    pub max_dd_r: f64,
    pub sqn: f64,
    pub trades_per_month: f64,
}

impl Summary {
    /// Compute the full summary. An empty list yields all zeros.
    pub fn compute(trades: &[Trade]) -> Self {
        let r = realized_r(trades);
        if r.is_empty() {
            return Self::default();
        }
        let avg = mean(&r);
        let wins: Vec<f64> = r.iter().copied().filter(|&x| x > 0.0).collect();
        let losses: Vec<f64> = r.iter().copied().filter(|&x| x < 0.0).collect();
        Self {
            trades: r.len(),
            win_rate: wins.len() as f64 / r.len() as f64,
            avg_r: avg,
            expectancy_r: avg,
            avg_win_r: mean(&wins),
            avg_loss_r: mean(&losses),
            sum_r: r.iter().sum(),
            max_dd_r: max_drawdown_r(&equity_curve_r(trades)),
            sqn: sqn(trades),
            trades_per_month: trades_per_month(trades),
        }
    }
}

/// Dimensions `grouped_summary` can slice by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    DayOfWeek,
    Month,
    Side,
    ExitReason,
    OrQuartile,
}

impl GroupBy {
    pub const ALL: [GroupBy; 5] = [
        GroupBy::DayOfWeek,
        GroupBy::Month,
        GroupBy::Side,
        GroupBy::ExitReason,
        GroupBy::OrQuartile,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GroupBy::DayOfWeek => "day_of_week",
            GroupBy::Month => "month",
            GroupBy::Side => "side",
            GroupBy::ExitReason => "exit_reason",
            GroupBy::OrQuartile => "or_quartile",
        }
    }
}

/// Summary per group key, sorted by key.
pub fn grouped_summary(trades: &[Trade], by: GroupBy) -> BTreeMap<String, Summary> {
    let keys: Vec<String> = match by {
        GroupBy::DayOfWeek => trades.iter().map(|t| day_name(t.entry_time.weekday()).to_string()).collect(),
        GroupBy::Month => trades.iter().map(|t| t.entry_time.format("%Y-%m").to_string()).collect(),
        GroupBy::Side => trades.iter().map(|t| t.side.to_string()).collect(),
        GroupBy::ExitReason => trades.iter().map(|t| t.exit_reason.to_string()).collect(),
        GroupBy::OrQuartile => or_quartiles(trades),
    };

    let mut groups: BTreeMap<String, Vec<Trade>> = BTreeMap::new();
    for (key, trade) in keys.into_iter().zip(trades) {
        groups.entry(key).or_default().push(trade.clone());
    }
    groups
        .into_iter()
        .map(|(key, group)| (key, Summary::compute(&group)))
        .collect()
}

// ─── Individual metric functions ────────────────────────────────────

fn realized_r(trades: &[Trade]) -> Vec<f64> {
    trades
        .iter()
        .map(|t| if t.realized_r.is_finite() { t.realized_r } else { 0.0 })
        .collect()
}

/// Cumulative realized R after each trade.
pub fn equity_curve_r(trades: &[Trade]) -> Vec<f64> {
    realized_r(trades)
        .into_iter()
        .scan(0.0, |acc, r| {
            *acc += r;
            Some(*acc)
        })
        .collect()
}

/// Largest peak-to-trough fall of an R curve, measured from a 0 baseline.
pub fn max_drawdown_r(curve: &[f64]) -> f64 {
    let mut peak = 0.0_f64;
    let mut worst = 0.0_f64;
    for &v in curve {
        let v = if v.is_finite() { v } else { 0.0 };
        peak = peak.max(v);
        worst = worst.max(peak - v);
    }
    worst
}

/// System Quality Number: mean / population std * sqrt(n).
///
/// Returns 0.0 with fewer than two trades or zero dispersion.
pub fn sqn(trades: &[Trade]) -> f64 {
    let r = realized_r(trades);
    if r.len() < 2 {
        return 0.0;
    }
    let std = population_std(&r);
    if std == 0.0 {
        return 0.0;
    }
    mean(&r) / std * (r.len() as f64).sqrt()
}

/// Trades per calendar month that saw at least one entry.
pub fn trades_per_month(trades: &[Trade]) -> f64 {
    let months: BTreeSet<(i32, u32)> = trades
        .iter()
        .map(|t| (t.entry_time.year(), t.entry_time.month()))
        .collect();
    if months.is_empty() {
        return 0.0;
    }
    trades.len() as f64 / months.len() as f64
}

/// Opening-range-height quartile labels `Q1..Q4`.
///
/// Fewer than four finite heights, or tied quartile edges, label every trade
/// `Q?`. Non-finite heights label as `nan`.
pub fn or_quartiles(trades: &[Trade]) -> Vec<String> {
    let mut finite: Vec<f64> = trades.iter().map(|t| t.or_height).filter(|h| h.is_finite()).collect();
    if finite.len() < 4 {
        return vec!["Q?".to_string(); trades.len()];
    }
    finite.sort_by(f64::total_cmp);
    let edges: Vec<f64> = [0.25, 0.5, 0.75]
        .iter()
        .map(|&q| quantile_sorted(&finite, q))
        .collect();
    let lo = finite[0];
    let hi = finite[finite.len() - 1];
    let strictly_increasing = lo < edges[0] && edges[0] < edges[1] && edges[1] < edges[2] && edges[2] < hi;
    if !strictly_increasing {
        return vec!["Q?".to_string(); trades.len()];
    }
    trades
        .iter()
        .map(|t| {
            let h = t.or_height;
            if !h.is_finite() {
                "nan".to_string()
            } else {
                let bucket = 1 + edges.iter().filter(|&&e| h > e).count();
                format!("Q{bucket}")
            }
        })
        .collect()
}

/// Linear-interpolation quantile of an ascending slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

fn day_name(day: chrono::Weekday) -> &'static str {
    match day {
        chrono::Weekday::Mon => "Monday",
        chrono::Weekday::Tue => "Tuesday",
        chrono::Weekday::Wed => "Wednesday",
        chrono::Weekday::Thu => "Thursday",
        chrono::Weekday::Fri => "Friday",
        chrono::Weekday::Sat => "Saturday",
        chrono::Weekday::Sun => "Sunday",
    }
}
