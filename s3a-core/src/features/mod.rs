//! Built-in feature provider.
//!
//! Fills every [`BarFeatures`](crate::domain::BarFeatures) column from raw
//! OHLCV. Each feature is a pure function over a bar slice and is computed
//! per session, except ATR which runs over the whole series. Nothing here
//! reads a bar later than the one it writes. `news_blackout` is an input
//! flag and is left untouched.

pub mod atr;
pub mod patterns;
pub mod session_refs;
pub mod swings;
pub mod trend;
pub mod vwap;

use crate::config::FeaturesConfig;
use crate::domain::{sessions, Bar, BarError};
use tracing::debug;

/// Compute all feature columns in place.
pub fn attach_features(bars: &mut [Bar], cfg: &FeaturesConfig) -> Result<(), BarError> {
    let sessions = sessions(bars)?;

    let atr15 = atr::atr(bars, cfg.atr_window);
    for (bar, v) in bars.iter_mut().zip(atr15) {
        bar.features.atr15 = v;
    }

    session_refs::apply(bars, &sessions, cfg.or_minutes);

    for s in &sessions {
        let slice = &bars[s.range.clone()];
        let bands = vwap::session_vwap(slice);
        let htf = trend::session_trend(slice, cfg.trend_bar_minutes, cfg.trend_lookback);
        let levels = swings::confirmed_swings(slice, cfg.swing_lb, cfg.swing_rb);
        let micro = swings::micro_break(slice, &levels);
        let engulf = patterns::engulfing(slice);

        for (j, bar) in bars[s.range.clone()].iter_mut().enumerate() {
            let f = &mut bar.features;
            f.vwap = bands.vwap[j];
            f.vwap_1u = bands.band(j, 1.0);
            f.vwap_1d = bands.band(j, -1.0);
            f.vwap_2u = bands.band(j, 2.0);
            f.vwap_2d = bands.band(j, -2.0);
            f.trend_5m = htf[j];
            f.last_swing_high = levels.last_high[j];
            f.last_swing_low = levels.last_low[j];
            f.micro_break_dir = micro[j];
            f.engulf_dir = engulf[j];
        }
    }

    debug!(bars = bars.len(), sessions = sessions.len(), "features attached");
    Ok(())
}

/// Minute bars for one session starting 09:30, from close prices.
///
/// open = prev_close (or close for the first bar), high = max(open, close) + 1,
/// low = min(open, close) - 1, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    make_bars_on(1, closes)
}

/// Like [`make_bars`] on the `day`-th session (2025-01-05 + day).
#[cfg(test)]
pub fn make_bars_on(day: u32, closes: &[f64]) -> Vec<Bar> {
    let start = chrono::NaiveDate::from_ymd_opt(2025, 1, 5 + day)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::new(
                start + chrono::Duration::minutes(i as i64),
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
                1000.0,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attaches_all_columns() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0).collect();
        let mut bars = make_bars(&closes);
        attach_features(&mut bars, &FeaturesConfig::default()).unwrap();
        let last = bars.last().unwrap().features;
        assert!(last.vwap.is_finite());
        assert!(last.vwap_2u >= last.vwap_1u);
        assert!(last.vwap_1d >= last.vwap_2d);
        assert!(last.or_height > 0.0);
        assert!(last.atr15 > 0.0);
        assert!(last.pdh.is_nan());
    }

    #[test]
    fn rejects_unordered_input() {
        let mut bars = make_bars(&[100.0, 101.0]);
        bars.swap(0, 1);
        assert!(attach_features(&mut bars, &FeaturesConfig::default()).is_err());
    }

    #[test]
    fn news_flag_is_preserved() {
        let mut bars = make_bars(&[100.0, 101.0]);
        bars[1].features.news_blackout = true;
        attach_features(&mut bars, &FeaturesConfig::default()).unwrap();
        assert!(bars[1].features.news_blackout);
    }
}
