//! Time-based exits: TP1 timeout, hard holding cap and conditional extension.
//!
//! Deadlines are measured in wall-clock minutes from the entry bar's
//! timestamp, so gaps in the bar sequence do not stretch them.

use crate::config::{TimeStopConfig, TimeStopMode};
use crate::domain::{Bar, Side, TimeStopTag};
use chrono::{Duration, NaiveDateTime};

/// Drawdown ceiling, in R, for holding a runner past TP1.
pub const MAX_EXTENSION_DRAWDOWN_R: f64 = 0.5;

/// Per-bar conditions that keep an extended runner alive.
///
/// Missing inputs (NaN VWAP or bands) evaluate to false.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionConditions {
    pub vwap_side: Vec<bool>,
    pub trend: Vec<bool>,
    pub sigma: Vec<bool>,
    pub drawdown: Vec<bool>,
}

impl ExtensionConditions {
    pub fn build(session: &[Bar], entry_index: usize, side: Side, entry: f64, risk: f64) -> Self {
        let n = session.len();
        let mut out = Self {
            vwap_side: Vec::with_capacity(n),
            trend: Vec::with_capacity(n),
            sigma: Vec::with_capacity(n),
            drawdown: vec![false; n],
        };
        for bar in session {
            let f = &bar.features;
            let close = bar.close;
            let (vwap_ok, sigma_ok) = match side {
                Side::Long => (close >= f.vwap, close >= f.vwap_1d),
                Side::Short => (close <= f.vwap, close <= f.vwap_1u),
            };
            out.vwap_side.push(vwap_ok);
            out.sigma.push(sigma_ok);
            out.trend.push(f.trend_5m == side.code());
        }

        if risk.is_finite() && risk > 0.0 {
            // Running adverse extreme from the entry bar onward.
            let mut worst = match side {
                Side::Long => f64::INFINITY,
                Side::Short => f64::NEG_INFINITY,
            };
            for i in entry_index.min(n)..n {
                let mae = match side {
                    Side::Long => {
                        worst = worst.min(session[i].low);
                        (entry - worst) / risk
                    }
                    Side::Short => {
                        worst = worst.max(session[i].high);
                        (worst - entry) / risk
                    }
                };
                out.drawdown[i] = mae <= MAX_EXTENSION_DRAWDOWN_R;
            }
        }
        out
    }

    /// All four conditions hold at bar `i`.
    pub fn holds(&self, i: usize) -> bool {
        let at = |v: &Vec<bool>| v.get(i).copied().unwrap_or(false);
        at(&self.vwap_side) && at(&self.trend) && at(&self.sigma) && at(&self.drawdown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeStopHit {
    pub index: usize,
    pub tag: TimeStopTag,
}

/// First bar after the entry bar whose timestamp reaches `deadline`.
fn first_at_or_after(session: &[Bar], entry_index: usize, deadline: NaiveDateTime) -> Option<usize> {
    let from = entry_index + 1;
    let tail = session.get(from..)?;
    let pos = tail.partition_point(|b| b.timestamp < deadline);
    (pos < tail.len()).then_some(from + pos)
}

/// Resolve the time-stop event for a trade entered at `entry_index`.
///
/// A TP1 touch after the TP1 deadline does not count as TP1 here, so the
/// timeout fires first.
pub fn run_time_stop(
    session: &[Bar],
    entry_index: usize,
    tp1_index: Option<usize>,
    cfg: &TimeStopConfig,
    conditions: &ExtensionConditions,
) -> Option<TimeStopHit> {
    if cfg.mode == TimeStopMode::Disabled {
        return None;
    }
    let entry_time = session.get(entry_index)?.timestamp;
    let tp1_deadline = entry_time + Duration::minutes(i64::from(cfg.tp1_timeout_min));
    let hard_deadline = entry_time + Duration::minutes(i64::from(cfg.max_holding_min));

    let tp1_in_time = tp1_index.filter(|&i| session[i].timestamp <= tp1_deadline);

    let Some(tp1) = tp1_in_time else {
        return first_at_or_after(session, entry_index, tp1_deadline).map(|index| TimeStopHit {
            index,
            tag: TimeStopTag::NoTp1,
        });
    };

    if !cfg.allow_extension {
        return first_at_or_after(session, entry_index, hard_deadline).map(|index| TimeStopHit {
            index,
            tag: TimeStopTag::MaxHold,
        });
    }

    for (i, bar) in session.iter().enumerate().skip(tp1 + 1) {
        if bar.timestamp > hard_deadline {
            return Some(TimeStopHit {
                index: i,
                tag: TimeStopTag::MaxHold,
            });
        }
        if !conditions.holds(i) {
            return Some(TimeStopHit {
                index: i,
                tag: TimeStopTag::ExtensionBreak,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::make_bars;

    fn flat_session(n: usize) -> Vec<Bar> {
        make_bars(&vec![100.0; n])
    }

    fn all_true(n: usize) -> ExtensionConditions {
        ExtensionConditions {
            vwap_side: vec![true; n],
            trend: vec![true; n],
            sigma: vec![true; n],
            drawdown: vec![true; n],
        }
    }

    #[test]
    fn no_tp1_times_out_at_deadline() {
        let bars = flat_session(30);
        let hit = run_time_stop(&bars, 2, None, &TimeStopConfig::default(), &all_true(30)).unwrap();
        assert_eq!(hit.index, 17);
        assert_eq!(hit.tag, TimeStopTag::NoTp1);
    }

    #[test]
    fn late_tp1_is_treated_as_missing() {
        let bars = flat_session(30);
        let hit = run_time_stop(&bars, 0, Some(20), &TimeStopConfig::default(), &all_true(30)).unwrap();
        assert_eq!(hit.tag, TimeStopTag::NoTp1);
        assert_eq!(hit.index, 15);
    }

    #[test]
    fn without_extension_holds_to_cap() {
        let bars = flat_session(60);
        let cfg = TimeStopConfig {
            allow_extension: false,
            ..TimeStopConfig::default()
        };
        let hit = run_time_stop(&bars, 0, Some(5), &cfg, &all_true(60)).unwrap();
        assert_eq!(hit.index, 45);
        assert_eq!(hit.tag, TimeStopTag::MaxHold);
    }

    #[test]
    fn extension_runs_past_cap_then_stops() {
        let bars = flat_session(60);
        let hit = run_time_stop(&bars, 0, Some(5), &TimeStopConfig::default(), &all_true(60)).unwrap();
        // First bar strictly beyond the 45-minute deadline.
        assert_eq!(hit.index, 46);
        assert_eq!(hit.tag, TimeStopTag::MaxHold);
    }

    #[test]
    fn failing_condition_breaks_extension() {
        let bars = flat_session(60);
        let mut conds = all_true(60);
        conds.trend[9] = false;
        let hit = run_time_stop(&bars, 0, Some(5), &TimeStopConfig::default(), &conds).unwrap();
        assert_eq!(hit.index, 9);
        assert_eq!(hit.tag, TimeStopTag::ExtensionBreak);
    }

    #[test]
    fn zero_durations_never_exit_on_the_entry_bar() {
        let bars = flat_session(10);
        let cfg = TimeStopConfig {
            tp1_timeout_min: 0,
            max_holding_min: 0,
            allow_extension: false,
            ..TimeStopConfig::default()
        };
        let hit = run_time_stop(&bars, 3, None, &cfg, &all_true(10)).unwrap();
        assert_eq!((hit.index, hit.tag), (4, TimeStopTag::NoTp1));

        let hit = run_time_stop(&bars, 3, Some(3), &cfg, &all_true(10)).unwrap();
        assert_eq!((hit.index, hit.tag), (4, TimeStopTag::MaxHold));

        assert!(run_time_stop(&bars, 9, None, &cfg, &all_true(10)).is_none());
    }

    #[test]
    fn disabled_mode_never_fires() {
        let bars = flat_session(60);
        let cfg = TimeStopConfig {
            mode: TimeStopMode::Disabled,
            ..TimeStopConfig::default()
        };
        assert!(run_time_stop(&bars, 0, None, &cfg, &all_true(60)).is_none());
    }

    #[test]
    fn short_session_without_deadline_bar_has_no_stop() {
        let bars = flat_session(10);
        assert!(run_time_stop(&bars, 0, None, &TimeStopConfig::default(), &all_true(10)).is_none());
    }

    #[test]
    fn nan_features_fail_conditions() {
        let bars = flat_session(5);
        let c = ExtensionConditions::build(&bars, 0, Side::Long, 100.0, 2.0);
        assert!(!c.holds(2));
        assert!(c.drawdown[0]);
    }

    #[test]
    fn drawdown_tracks_running_extreme() {
        // Lows: 99, 99, 98.5 ... long entry at 100 with risk 2: MAE 0.5R, then 0.75R.
        let mut bars = flat_session(4);
        bars[2].low = 99.0;
        bars[3].low = 98.5;
        let c = ExtensionConditions::build(&bars, 1, Side::Long, 100.0, 2.0);
        assert!(!c.drawdown[0]);
        assert!(c.drawdown[1]);
        assert!(c.drawdown[2]);
        assert!(!c.drawdown[3]);
    }
}
