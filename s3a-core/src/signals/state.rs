//! Per-session accumulator for the unlock → zone → trigger progression.
//!
//! One [`SessionState`] is created at every session boundary and folded
//! over that session's bars in order. Each step reads only the current bar
//! and the state left by earlier bars.

use super::row::SignalRow;
use crate::config::{EntryWindow, StrategyConfig, ZoneTouchMode};
use crate::domain::{Bar, BarFeatures};

/// Config slice the state machine consults on every bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalRules {
    pub entry_window: EntryWindow,
    pub disqualify_after_unlock: bool,
    pub zone_touch_mode: ZoneTouchMode,
    pub trigger_lookback_bars: usize,
    pub require_vwap_side: bool,
    pub tick_size: f64,
    pub max_stop_or_mult: f64,
}

impl SignalRules {
    pub fn from_config(cfg: &StrategyConfig) -> Self {
        Self {
            entry_window: cfg.entry_window,
            disqualify_after_unlock: cfg.signals.disqualify_after_unlock,
            zone_touch_mode: cfg.signals.zone_touch_mode,
            trigger_lookback_bars: cfg.signals.trigger_lookback_bars as usize,
            require_vwap_side: cfg.signals.require_vwap_side,
            tick_size: cfg.slippage.tick_size,
            max_stop_or_mult: cfg.risk.max_stop_or_mult,
        }
    }
}

impl Default for SignalRules {
    fn default() -> Self {
        Self::from_config(&StrategyConfig::default())
    }
}

/// Latched session state. Reset by constructing a new value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    unlock_index: Option<usize>,
    direction: i8,
    disqualified: bool,
    zone_index: Option<usize>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn direction(&self) -> i8 {
        self.direction
    }

    pub fn unlock_index(&self) -> Option<usize> {
        self.unlock_index
    }

    pub fn zone_index(&self) -> Option<usize> {
        self.zone_index
    }

    /// Advance by one bar. `i` is the bar's position within its session.
    pub fn step(&mut self, i: usize, bar: &Bar, rules: &SignalRules) -> SignalRow {
        let f = &bar.features;
        let close = bar.close;
        let time_window_ok = rules.entry_window.contains(bar.clock());
        let trend = f.trend_5m.signum();

        // ── Unlock ──
        let candidate = breakout_direction(trend, close, f);
        let vwap_side_ok = !rules.require_vwap_side || on_vwap_side(candidate, close, f.vwap);
        let unlock_raw = candidate != 0 && vwap_side_ok && time_window_ok;
        let or_break_unlock = unlock_raw && self.unlock_index.is_none();
        if or_break_unlock {
            self.unlock_index = Some(i);
            self.direction = candidate;
        }
        let unlocked = self.unlock_index.is_some();

        // ── Disqualification ──
        let breach_side = if unlocked {
            self.direction
        } else if rules.disqualify_after_unlock {
            0
        } else {
            trend
        };
        if opposite_band_breach(breach_side, close, f) {
            self.disqualified = true;
        }

        // ── Zone ──
        let past_unlock = matches!(self.unlock_index, Some(u) if i > u);
        let zone_candidate = past_unlock
            && !self.disqualified
            && zone_touch(self.direction, bar, rules.zone_touch_mode);
        let in_zone = zone_candidate && self.zone_index.is_none();
        if in_zone {
            self.zone_index = Some(i);
        }
        let zone_seen = self.zone_index.is_some();
        let zone_recent = self
            .zone_index
            .is_some_and(|z| i - z <= rules.trigger_lookback_bars);

        // ── Trigger ──
        let pattern_ok = self.direction != 0
            && (f.micro_break_dir == self.direction || f.engulf_dir == self.direction);
        let trigger_ok = self.direction != 0
            && zone_seen
            && zone_recent
            && pattern_ok
            && time_window_ok
            && !self.disqualified;

        // ── Risk pre-check ──
        let stop_price = proposed_stop(self.direction, f, rules.tick_size);
        let riskcap_ok = within_risk_cap(self.direction, close, stop_price, f, rules.max_stop_or_mult);

        SignalRow {
            time_window_ok,
            or_break_unlock,
            unlocked,
            direction: self.direction,
            disqualified: self.disqualified,
            in_zone,
            zone_seen,
            zone_recent,
            trigger_ok,
            stop_price,
            riskcap_ok,
        }
    }
}

/// +1 up-trend and close above OR high, -1 down-trend and close below OR low.
fn breakout_direction(trend: i8, close: f64, f: &BarFeatures) -> i8 {
    if trend > 0 && close > f.or_high {
        1
    } else if trend < 0 && close < f.or_low {
        -1
    } else {
        0
    }
}

fn on_vwap_side(direction: i8, close: f64, vwap: f64) -> bool {
    match direction {
        1 => close >= vwap,
        -1 => close <= vwap,
        _ => false,
    }
}

fn opposite_band_breach(direction: i8, close: f64, f: &BarFeatures) -> bool {
    match direction {
        1 => close <= f.vwap_2d,
        -1 => close >= f.vwap_2u,
        _ => false,
    }
}

/// Pullback into the band between VWAP and the 1σ line on the trade side.
fn zone_touch(direction: i8, bar: &Bar, mode: ZoneTouchMode) -> bool {
    let f = &bar.features;
    let (lower, upper) = match direction {
        1 => (f.vwap, f.vwap_1u),
        -1 => (f.vwap_1d, f.vwap),
        _ => return false,
    };
    match mode {
        ZoneTouchMode::Close => lower <= bar.close && bar.close <= upper,
        ZoneTouchMode::Range => bar.low <= upper && bar.high >= lower,
    }
}

/// Stop one tick beyond the last confirmed swing extreme.
pub fn proposed_stop(direction: i8, f: &BarFeatures, tick_size: f64) -> f64 {
    match direction {
        1 => f.last_swing_low - tick_size,
        -1 => f.last_swing_high + tick_size,
        _ => f64::NAN,
    }
}

fn within_risk_cap(direction: i8, close: f64, stop: f64, f: &BarFeatures, mult: f64) -> bool {
    if direction == 0 || !stop.is_finite() {
        return false;
    }
    let or_height = f.opening_range_height();
    if !(or_height.is_finite() && or_height > 0.0) {
        return false;
    }
    (close - stop).abs() <= mult * or_height
}
