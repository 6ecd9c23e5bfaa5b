//! Higher-timeframe trend from resampled buckets.
//!
//! Minute bars are grouped into right-labelled, right-closed buckets of
//! `bucket_minutes` (the bar at 09:35 closes the 09:35 bucket). On the
//! bucket series a higher-high and higher-low against the previous
//! `lookback` buckets flips the trend up, a lower-high and lower-low flips it
//! down, anything else carries the previous value.
//!
//! The value exposed on a minute bar is lagged by one completed bucket: a
//! minute at `t` sees the trend of the bucket before the latest bucket whose
//! label is `<= t`.

use crate::domain::Bar;
use chrono::{NaiveDateTime, Timelike};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bucket {
    label: NaiveDateTime,
    high: f64,
    low: f64,
}

/// Right-closed bucket label: `t` rounded up to the next multiple of `minutes`.
fn bucket_label(t: NaiveDateTime, minutes: u32) -> NaiveDateTime {
    let minute_of_day = t.hour() * 60 + t.minute();
    let aligned = t.second() == 0 && t.nanosecond() == 0 && minute_of_day % minutes == 0;
    let base = t
        .with_second(0)
        .and_then(|x| x.with_nanosecond(0))
        .unwrap_or(t);
    if aligned {
        base
    } else {
        let up = minutes - minute_of_day % minutes;
        base + chrono::Duration::minutes(i64::from(up))
    }
}

fn resample(bars: &[Bar], minutes: u32) -> (Vec<Bucket>, Vec<usize>) {
    let mut buckets: Vec<Bucket> = Vec::new();
    let mut owner = Vec::with_capacity(bars.len());
    for bar in bars {
        let label = bucket_label(bar.timestamp, minutes);
        match buckets.last_mut() {
            Some(b) if b.label == label => {
                b.high = b.high.max(bar.high);
                b.low = b.low.min(bar.low);
            }
            _ => buckets.push(Bucket {
                label,
                high: bar.high,
                low: bar.low,
            }),
        }
        owner.push(buckets.len() - 1);
    }
    (buckets, owner)
}

fn bucket_trend(buckets: &[Bucket], lookback: usize) -> Vec<i8> {
    let mut out = vec![0i8; buckets.len()];
    for i in 1..buckets.len() {
        out[i] = out[i - 1];
        if i < lookback {
            continue;
        }
        let window = &buckets[i - lookback..i];
        let prev_high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let prev_low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let b = buckets[i];
        let up = b.high > prev_high && b.low > prev_low;
        let down = b.high < prev_high && b.low < prev_low;
        if up && !down {
            out[i] = 1;
        } else if down && !up {
            out[i] = -1;
        }
    }
    out
}

/// Lagged trend for one session, one value per minute bar.
pub fn session_trend(bars: &[Bar], bucket_minutes: u32, lookback: usize) -> Vec<i8> {
    if bars.is_empty() || bucket_minutes == 0 {
        return vec![0; bars.len()];
    }
    let (buckets, owner) = resample(bars, bucket_minutes);
    let trend = bucket_trend(&buckets, lookback);

    bars.iter()
        .zip(owner)
        .map(|(bar, k)| {
            // Latest bucket whose label is <= t.
            let latest = if buckets[k].label <= bar.timestamp {
                Some(k)
            } else {
                k.checked_sub(1)
            };
            match latest.and_then(|k| k.checked_sub(1)) {
                Some(prev) => trend[prev],
                None => 0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::make_bars;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn labels_round_up_to_bucket_end() {
        assert_eq!(bucket_label(at(9, 31), 5), at(9, 35));
        assert_eq!(bucket_label(at(9, 35), 5), at(9, 35));
        assert_eq!(bucket_label(at(9, 36), 5), at(9, 40));
    }

    #[test]
    fn rising_buckets_turn_trend_up_after_lag() {
        // Strictly rising closes: every bucket makes HH and HL.
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let t = session_trend(&bars, 5, 3);
        // Nothing known during the first buckets.
        assert_eq!(t[0], 0);
        assert_eq!(*t.last().unwrap(), 1);
        assert!(t.iter().all(|&v| v >= 0));
    }

    #[test]
    fn falling_buckets_turn_trend_down() {
        let closes: Vec<f64> = (0..40).map(|i| 200.0 - i as f64).collect();
        let t = session_trend(&make_bars(&closes), 5, 3);
        assert_eq!(*t.last().unwrap(), -1);
    }

    #[test]
    fn trend_does_not_depend_on_later_bars() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let full = session_trend(&make_bars(&closes), 5, 3);
        let cut = session_trend(&make_bars(&closes[..23]), 5, 3);
        assert_eq!(&full[..23], &cut[..]);
    }
}
