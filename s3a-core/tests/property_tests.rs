//! Property tests for signal and lifecycle invariants.
//!
//! Uses proptest to verify:
//! 1. Exactly-once events: at most one unlock and one zone bar per session,
//!    the zone strictly after the unlock
//! 2. Latches: `unlocked` and `disqualified` never turn back off
//! 3. No look-ahead: rewriting bars after `t` leaves rows `..=t` unchanged
//! 4. Realized R stays within the bounds the targets allow

use chrono::NaiveDate;
use proptest::prelude::*;
use s3a_core::config::{ManagementConfig, StrategyConfig, TimeStopConfig};
use s3a_core::domain::{Bar, BarFeatures, Side};
use s3a_core::generate_signals;
use s3a_core::lifecycle::{manage_trade, OpenPosition, TargetRefs};
use s3a_core::signals::SignalRow;

// ── Strategies (proptest) ────────────────────────────────────────────

/// Per-bar inputs: close, 5m trend, micro-break, engulfing.
fn arb_bar() -> impl Strategy<Value = (f64, i8, i8, i8)> {
    (88.0..112.0_f64, -1i8..=1, -1i8..=1, -1i8..=1)
}

fn arb_session() -> impl Strategy<Value = Vec<(f64, i8, i8, i8)>> {
    prop::collection::vec(arb_bar(), 20..90)
}

fn build_session(day: u32, moves: &[(f64, i8, i8, i8)]) -> Vec<Bar> {
    let start = NaiveDate::from_ymd_opt(2025, 2, day)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    moves.iter()
        .enumerate()
        .map(|(i, &(close, trend, micro, engulf))| {
            let open = if i == 0 { close } else { moves[i - 1].0 };
            let mut bar = Bar::new(
                start + chrono::Duration::minutes(i as i64),
                open,
                open.max(close) + 0.5,
                open.min(close) - 0.5,
                close,
                1000.0,
            );
            bar.features = BarFeatures {
                or_high: 104.0,
                or_low: 96.0,
                or_height: 8.0,
                vwap: 100.0,
                vwap_1u: 102.0,
                vwap_1d: 98.0,
                vwap_2u: 106.0,
                vwap_2d: 94.0,
                trend_5m: trend,
                last_swing_high: 103.0,
                last_swing_low: 97.0,
                micro_break_dir: micro,
                engulf_dir: engulf,
                ..BarFeatures::default()
            };
            bar
        })
        .collect()
}

fn rows_for(bars: &[Bar], disqualify_after_unlock: bool) -> Vec<SignalRow> {
    let mut cfg = StrategyConfig::default();
    cfg.signals.disqualify_after_unlock = disqualify_after_unlock;
    generate_signals(bars, &cfg).unwrap()
}

/// NaN-tolerant row comparison.
fn same_row(a: &SignalRow, b: &SignalRow) -> bool {
    format!("{a:?}") == format!("{b:?}")
}

// ── 1 & 2. Exactly-once events and latches ───────────────────────────

proptest! {
    #[test]
    fn unlock_and_zone_fire_at_most_once(moves in arb_session(), after in any::<bool>()) {
        let bars = build_session(3, &moves);
        let rows = rows_for(&bars, after);

        let unlocks: Vec<usize> = (0..rows.len()).filter(|&i| rows[i].or_break_unlock).collect();
        let zones: Vec<usize> = (0..rows.len()).filter(|&i| rows[i].in_zone).collect();
        prop_assert!(unlocks.len() <= 1);
        prop_assert!(zones.len() <= 1);
        if let Some(&z) = zones.first() {
            prop_assert!(unlocks.first().is_some_and(|&u| z > u));
        }
        for (i, r) in rows.iter().enumerate() {
            prop_assert_eq!(r.unlocked, unlocks.first().is_some_and(|&u| i >= u));
            if r.trigger_ok {
                prop_assert!(r.unlocked && r.zone_seen && r.time_window_ok && !r.disqualified);
            }
        }
    }

    #[test]
    fn disqualified_never_resets(moves in arb_session(), after in any::<bool>()) {
        let bars = build_session(3, &moves);
        let rows = rows_for(&bars, after);
        for w in rows.windows(2) {
            prop_assert!(!w[0].disqualified || w[1].disqualified);
            prop_assert!(w[0].direction == 0 || w[1].direction == w[0].direction);
        }
    }

    #[test]
    fn each_session_starts_fresh(a in arb_session(), b in arb_session()) {
        let mut bars = build_session(3, &a);
        bars.extend(build_session(4, &b));
        let joined = rows_for(&bars, true);
        let alone = rows_for(&build_session(4, &b), true);
        for (x, y) in joined[a.len()..].iter().zip(&alone) {
            prop_assert!(same_row(x, y));
        }
    }
}

// ── 3. No look-ahead ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn future_bars_do_not_change_past_rows(
        moves in arb_session(),
        replacement in arb_session(),
        cut_frac in 0.0..1.0_f64,
    ) {
        let bars = build_session(3, &moves);
        let cut = ((moves.len() - 1) as f64 * cut_frac) as usize;

        let mut mutated_moves = moves.clone();
        for (dst, src) in mutated_moves.iter_mut().skip(cut + 1).zip(replacement.iter().cycle()) {
            *dst = *src;
        }
        let mutated = build_session(3, &mutated_moves);

        let base = rows_for(&bars, true);
        let other = rows_for(&mutated, true);
        for t in 0..=cut {
            prop_assert!(same_row(&base[t], &other[t]), "row {} changed", t);
        }
    }
}

// ── 4. Realized R bounds ─────────────────────────────────────────────

proptest! {
    /// A full stop-out is exactly -1R; once TP1 banks half at 1R the
    /// breakeven runner can no longer lose.
    #[test]
    fn realized_r_within_target_bounds(moves in arb_session(), long in any::<bool>()) {
        let bars = build_session(3, &moves);
        let entry = bars[0].close;
        let side = if long { Side::Long } else { Side::Short };
        let stop = entry - side.sign() * 2.0;
        let pos = OpenPosition {
            entry_index: 0,
            side,
            entry,
            stop,
            refs: TargetRefs { pdh: f64::NAN, pdl: f64::NAN, or_height: f64::NAN },
        };
        let out = manage_trade(&bars, &pos, &ManagementConfig::default(), &TimeStopConfig::default()).unwrap();
        prop_assert!(out.exit_index < bars.len());
        prop_assert!(out.realized_r.is_finite());
        if out.exit_reason == s3a_core::domain::ExitReason::Stop && !out.tp1_hit {
            prop_assert!((out.realized_r + 1.0).abs() < 1e-9);
        }
        if out.tp1_hit {
            prop_assert!(out.realized_r >= 0.5 - 1e-9);
        }
    }
}
