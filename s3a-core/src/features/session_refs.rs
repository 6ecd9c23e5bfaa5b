//! Session reference levels: opening range and prior-day high/low.

use crate::domain::{Bar, Session, RTH_OPEN};
use chrono::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpeningRange {
    pub high: f64,
    pub low: f64,
}

impl OpeningRange {
    pub fn height(&self) -> f64 {
        self.high - self.low
    }
}

/// Opening range of one session: extremes of bars in `[09:30, 09:30 + minutes)`.
///
/// `None` when the session has no bar inside the window.
pub fn opening_range(bars: &[Bar], minutes: u32) -> Option<OpeningRange> {
    let end = RTH_OPEN + Duration::minutes(i64::from(minutes));
    let mut found: Option<OpeningRange> = None;
    for bar in bars {
        let t = bar.clock();
        if t < RTH_OPEN || t >= end || bar.is_void() {
            continue;
        }
        found = Some(match found {
            None => OpeningRange {
                high: bar.high,
                low: bar.low,
            },
            Some(or) => OpeningRange {
                high: or.high.max(bar.high),
                low: or.low.min(bar.low),
            },
        });
    }
    found
}

/// Session high/low over every bar.
pub fn session_extremes(bars: &[Bar]) -> Option<(f64, f64)> {
    bars.iter()
        .filter(|b| !b.is_void())
        .fold(None, |acc, b| match acc {
            None => Some((b.high, b.low)),
            Some((h, l)) => Some((f64::max(h, b.high), f64::min(l, b.low))),
        })
}

/// Fill OR and PDH/PDL columns for every session.
pub fn apply(bars: &mut [Bar], sessions: &[Session], or_minutes: u32) {
    let mut prior: Option<(f64, f64)> = None;
    for s in sessions {
        let slice = &bars[s.range.clone()];
        let or = opening_range(slice, or_minutes);
        let extremes = session_extremes(slice);
        for bar in &mut bars[s.range.clone()] {
            let f = &mut bar.features;
            match or {
                Some(or) => {
                    f.or_high = or.high;
                    f.or_low = or.low;
                    f.or_height = or.height();
                }
                None => {
                    f.or_high = f64::NAN;
                    f.or_low = f64::NAN;
                    f.or_height = f64::NAN;
                }
            }
            let (pdh, pdl) = prior.unwrap_or((f64::NAN, f64::NAN));
            f.pdh = pdh;
            f.pdl = pdl;
        }
        prior = extremes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sessions;
    use crate::features::{make_bars, make_bars_on};

    #[test]
    fn or_uses_first_five_minutes() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0, 104.0, 120.0]);
        let or = opening_range(&bars, 5).unwrap();
        assert_eq!(or.high, 105.0);
        assert_eq!(or.low, 99.0);
        assert_eq!(or.height(), 6.0);
    }

    #[test]
    fn or_missing_without_opening_bars() {
        let mut bars = make_bars(&[100.0, 101.0]);
        for b in &mut bars {
            b.timestamp += Duration::hours(1);
        }
        assert!(opening_range(&bars, 5).is_none());
    }

    #[test]
    fn prior_day_levels_come_from_previous_session() {
        let mut bars = make_bars_on(1, &[100.0, 110.0]);
        bars.extend(make_bars_on(2, &[90.0, 95.0]));
        let s = sessions(&bars).unwrap();
        apply(&mut bars, &s, 5);
        assert!(bars[0].features.pdh.is_nan());
        assert_eq!(bars[2].features.pdh, 111.0);
        assert_eq!(bars[2].features.pdl, 99.0);
        assert_eq!(bars[3].features.pdl, 99.0);
        assert_eq!(bars[2].features.or_low, 89.0);
    }
}
