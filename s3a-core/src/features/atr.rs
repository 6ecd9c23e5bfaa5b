//! Average True Range over minute bars.
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR here is a plain rolling mean of TR with a minimum of one period, so
//! the first bars carry a partial-window average rather than a NaN warmup.

use crate::domain::Bar;

/// TR[0] = high[0] - low[0] (no previous close).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = vec![f64::NAN; bars.len()];
    for (i, bar) in bars.iter().enumerate() {
        let (h, l) = (bar.high, bar.low);
        if h.is_nan() || l.is_nan() {
            continue;
        }
        let pc = if i == 0 { f64::NAN } else { bars[i - 1].close };
        tr[i] = if pc.is_nan() {
            h - l
        } else {
            (h - l).max((h - pc).abs()).max((l - pc).abs())
        };
    }
    tr
}

/// Trailing mean over up to `window` values, skipping NaNs.
/// NaN only when the window holds no finite value.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }
    for i in 0..values.len() {
        let lo = (i + 1).saturating_sub(window);
        let (sum, count) = values[lo..=i]
            .iter()
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
        if count > 0 {
            out[i] = sum / count as f64;
        }
    }
    out
}

/// ATR over the whole series (not reset at session boundaries).
pub fn atr(bars: &[Bar], window: usize) -> Vec<f64> {
    rolling_mean(&true_range(bars), window)
}
