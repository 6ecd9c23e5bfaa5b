//! Session filters: skip whole trading days before any entry is admitted.
//!
//! Rolling statistics only look at sessions strictly before the one being
//! judged. A statistic with too few finite inputs never blocks a day.

use crate::config::FiltersConfig;
use crate::domain::{Bar, Session};
use serde::Serialize;

/// Sessions in the tiny-OR median lookback.
pub const TINY_OR_LOOKBACK: usize = 15;
pub const TINY_OR_MIN_PERIODS: usize = 5;
/// Sessions in the low-ATR percentile lookback.
pub const LOW_ATR_LOOKBACK: usize = 60;
pub const LOW_ATR_MIN_PERIODS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    TinyOr,
    LowAtr,
    NewsBlackout,
}

/// Per-session summary the rules are evaluated on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionStats {
    pub or_height: f64,
    pub last_atr: f64,
    pub news: bool,
}

impl SessionStats {
    pub fn of(bars: &[Bar]) -> Self {
        let finite_max = |get: fn(&Bar) -> f64| {
            bars.iter().map(get).filter(|v| v.is_finite()).fold(f64::NAN, f64::max)
        };
        let finite_min = |get: fn(&Bar) -> f64| {
            bars.iter().map(get).filter(|v| v.is_finite()).fold(f64::NAN, f64::min)
        };
        let or_high = finite_max(|b| b.features.or_high);
        let or_low = finite_min(|b| b.features.or_low);
        Self {
            or_height: or_high - or_low,
            last_atr: bars.last().map_or(f64::NAN, |b| b.features.atr15),
            news: bars.iter().any(|b| b.features.news_blackout),
        }
    }
}

/// Median of the finite values, or NaN when fewer than `min_periods`.
fn median(values: &[f64], min_periods: usize) -> f64 {
    percentile(values, 50.0, min_periods)
}

/// Linearly interpolated percentile (`q` in [0, 100]) of the finite values.
pub fn percentile(values: &[f64], q: f64, min_periods: usize) -> f64 {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if v.is_empty() || v.len() < min_periods {
        return f64::NAN;
    }
    v.sort_by(f64::total_cmp);
    let pos = (q.clamp(0.0, 100.0) / 100.0) * (v.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    v[lo] + (v[hi] - v[lo]) * (pos - lo as f64)
}

fn window(stats: &[SessionStats], i: usize, lookback: usize, get: fn(&SessionStats) -> f64) -> Vec<f64> {
    stats[i.saturating_sub(lookback)..i].iter().map(get).collect()
}

/// Verdict for every session: `None` means tradable.
pub fn evaluate_sessions(stats: &[SessionStats], cfg: &FiltersConfig) -> Vec<Option<SkipReason>> {
    (0..stats.len())
        .map(|i| {
            let today = &stats[i];
            if cfg.enable_tiny_or {
                let med = median(&window(stats, i, TINY_OR_LOOKBACK, |s| s.or_height), TINY_OR_MIN_PERIODS);
                if today.or_height.is_finite() && med.is_finite() && today.or_height < med * cfg.tiny_or_mult {
                    return Some(SkipReason::TinyOr);
                }
            }
            if cfg.enable_low_atr && cfg.low_atr_percentile > 0.0 {
                let threshold = percentile(
                    &window(stats, i, LOW_ATR_LOOKBACK, |s| s.last_atr),
                    cfg.low_atr_percentile,
                    LOW_ATR_MIN_PERIODS,
                );
                if today.last_atr.is_finite() && threshold.is_finite() && today.last_atr < threshold {
                    return Some(SkipReason::LowAtr);
                }
            }
            if cfg.enable_news_blackout && today.news {
                return Some(SkipReason::NewsBlackout);
            }
            None
        })
        .collect()
}

/// Session verdicts computed straight from the bars.
pub fn session_filter(bars: &[Bar], sessions: &[Session], cfg: &FiltersConfig) -> Vec<Option<SkipReason>> {
    let stats: Vec<SessionStats> = sessions.iter().map(|s| SessionStats::of(s.bars(bars))).collect();
    evaluate_sessions(&stats, cfg)
}
