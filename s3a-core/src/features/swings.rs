//! Fractal swings and micro-structure breaks.
//!
//! A swing high at bar `i` has a high strictly above the `lb` bars before it
//! and at least as high as the `rb` bars after it (mirrored for lows). The
//! swing only becomes known at bar `i + rb`, which is where it is recorded.

use crate::domain::Bar;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwingLevels {
    /// Most recent confirmed swing high price, NaN until the first one.
    pub last_high: Vec<f64>,
    pub last_low: Vec<f64>,
    /// True on the bar where a swing high becomes confirmed.
    pub high_confirmed: Vec<bool>,
    pub low_confirmed: Vec<bool>,
}

/// Raw fractal detection: flags sit on the pivot bar itself.
pub fn find_swings(bars: &[Bar], lb: usize, rb: usize) -> (Vec<bool>, Vec<bool>) {
    let n = bars.len();
    let mut swing_high = vec![false; n];
    let mut swing_low = vec![false; n];
    if lb == 0 || rb == 0 || n < lb + rb + 1 {
        return (swing_high, swing_low);
    }
    for i in lb..n - rb {
        let hi = bars[i].high;
        let lo = bars[i].low;
        let left = &bars[i - lb..i];
        let right = &bars[i + 1..=i + rb];
        swing_high[i] = left.iter().all(|b| hi > b.high) && right.iter().all(|b| hi >= b.high);
        swing_low[i] = left.iter().all(|b| lo < b.low) && right.iter().all(|b| lo <= b.low);
    }
    (swing_high, swing_low)
}

/// Confirmed swing levels for one session slice.
pub fn confirmed_swings(bars: &[Bar], lb: usize, rb: usize) -> SwingLevels {
    let n = bars.len();
    let (raw_high, raw_low) = find_swings(bars, lb, rb);
    let mut out = SwingLevels {
        last_high: vec![f64::NAN; n],
        last_low: vec![f64::NAN; n],
        high_confirmed: vec![false; n],
        low_confirmed: vec![false; n],
    };
    let mut high = f64::NAN;
    let mut low = f64::NAN;
    for j in 0..n {
        if let Some(i) = j.checked_sub(rb) {
            if raw_high[i] {
                high = bars[i].high;
                out.high_confirmed[j] = true;
            }
            if raw_low[i] {
                low = bars[i].low;
                out.low_confirmed[j] = true;
            }
        }
        out.last_high[j] = high;
        out.last_low[j] = low;
    }
    out
}

/// +1 the first time high exceeds the last confirmed swing high, -1 the
/// first time low undercuts the last confirmed swing low. Each new confirmed
/// swing re-arms its side. A bar breaking both ways yields 0.
pub fn micro_break(bars: &[Bar], swings: &SwingLevels) -> Vec<i8> {
    let mut out = vec![0i8; bars.len()];
    let mut high_broken = false;
    let mut low_broken = false;
    for (j, bar) in bars.iter().enumerate() {
        if swings.high_confirmed[j] {
            high_broken = false;
        }
        if swings.low_confirmed[j] {
            low_broken = false;
        }
        let sh = swings.last_high[j];
        let sl = swings.last_low[j];
        let up = !high_broken && bar.high > sh;
        let down = !low_broken && bar.low < sl;
        if up && !down {
            out[j] = 1;
            high_broken = true;
        } else if down && !up {
            out[j] = -1;
            low_broken = true;
        }
    }
    out
}
