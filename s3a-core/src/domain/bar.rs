//! Bar: one regular-trading-hours minute plus its precomputed feature columns.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a bar sequence violates the input contract.
#[derive(Debug, Error, PartialEq)]
pub enum BarError {
    #[error("timestamps must be strictly increasing: bar {index} at {timestamp} is not after its predecessor")]
    NotMonotonic {
        index: usize,
        timestamp: NaiveDateTime,
    },

    #[error("signal rows ({signals}) do not line up with bars ({bars})")]
    LengthMismatch { bars: usize, signals: usize },
}

/// Per-bar feature columns supplied by the feature provider.
///
/// Absent price-like features are `NaN`; absent directional features are 0.
/// A `NaN` never satisfies a comparison, so bars with missing features
/// silently fail every breakout, zone and pattern predicate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarFeatures {
    // ── Session references ──
    pub or_high: f64,
    pub or_low: f64,
    pub or_height: f64,
    /// Prior session high (read-only cross-session reference).
    pub pdh: f64,
    /// Prior session low (read-only cross-session reference).
    pub pdl: f64,

    // ── VWAP envelope ──
    pub vwap: f64,
    pub vwap_1u: f64,
    pub vwap_1d: f64,
    pub vwap_2u: f64,
    pub vwap_2d: f64,

    // ── Volatility ──
    pub atr15: f64,

    // ── Structure ──
    /// Higher-timeframe trend, lagged by one completed bar: +1 up, -1 down, 0 flat or unknown.
    pub trend_5m: i8,
    pub last_swing_high: f64,
    pub last_swing_low: f64,
    pub micro_break_dir: i8,
    pub engulf_dir: i8,

    // ── Session flags ──
    pub news_blackout: bool,
}

impl Default for BarFeatures {
    fn default() -> Self {
        Self {
            or_high: f64::NAN,
            or_low: f64::NAN,
            or_height: f64::NAN,
            pdh: f64::NAN,
            pdl: f64::NAN,
            vwap: f64::NAN,
            vwap_1u: f64::NAN,
            vwap_1d: f64::NAN,
            vwap_2u: f64::NAN,
            vwap_2d: f64::NAN,
            atr15: f64::NAN,
            trend_5m: 0,
            last_swing_high: f64::NAN,
            last_swing_low: f64::NAN,
            micro_break_dir: 0,
            engulf_dir: 0,
            news_blackout: false,
        }
    }
}

impl BarFeatures {
    /// Opening-range height, preferring the precomputed column.
    pub fn opening_range_height(&self) -> f64 {
        if self.or_height.is_finite() {
            self.or_height
        } else {
            self.or_high - self.or_low
        }
    }
}

/// A single minute bar keyed by its exchange-local timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub features: BarFeatures,
}

impl Bar {
    pub fn new(timestamp: NaiveDateTime, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            features: BarFeatures::default(),
        }
    }

    /// Session key: calendar date in the exchange time zone.
    pub fn session_date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn clock(&self) -> NaiveTime {
        self.timestamp.time()
    }

    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, low <= open/close.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

/// Verify the strictly-increasing timestamp contract.
pub fn ensure_monotonic(bars: &[Bar]) -> Result<(), BarError> {
    for (i, pair) in bars.windows(2).enumerate() {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(BarError::NotMonotonic {
                index: i + 1,
                timestamp: pair[1].timestamp,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn sample_bar() -> Bar {
        Bar::new(ts(9, 30), 100.0, 105.0, 98.0, 103.0, 1_000.0)
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.close = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn default_features_are_missing() {
        let f = BarFeatures::default();
        assert!(f.vwap.is_nan());
        assert_eq!(f.micro_break_dir, 0);
        assert!(!f.news_blackout);
    }

    #[test]
    fn or_height_falls_back_to_range() {
        let f = BarFeatures {
            or_high: 110.0,
            or_low: 90.0,
            ..Default::default()
        };
        assert_eq!(f.opening_range_height(), 20.0);
    }

    #[test]
    fn monotonic_check_rejects_duplicates() {
        let bars = vec![sample_bar(), sample_bar()];
        assert_eq!(
            ensure_monotonic(&bars),
            Err(BarError::NotMonotonic {
                index: 1,
                timestamp: ts(9, 30)
            })
        );
    }

    #[test]
    fn monotonic_check_accepts_increasing() {
        let mut second = sample_bar();
        second.timestamp = ts(9, 31);
        assert!(ensure_monotonic(&[sample_bar(), second]).is_ok());
    }
}
