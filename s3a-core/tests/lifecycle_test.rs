//! Trade lifecycle tests through the public API: admission under gap risk
//! and the stop / TP1 / TP2 / time-stop race.

use chrono::NaiveDate;
use s3a_core::config::{ExecutionMode, ManagementConfig, TimeStopConfig, TimeStopMode};
use s3a_core::domain::{Bar, ExitReason, Side, TimeStopTag, Tp2Label};
use s3a_core::lifecycle::{
    admit, manage_trade, Admission, NoSlippage, OpenPosition, Rejection, TargetRefs, TradeCandidate,
};

const NO_REFS: TargetRefs = TargetRefs {
    pdh: f64::NAN,
    pdl: f64::NAN,
    or_height: f64::NAN,
};

/// Bars from (open, high, low, close), one minute apart from 10:00.
fn bars(ohlc: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    let start = NaiveDate::from_ymd_opt(2025, 6, 2)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    ohlc.iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| Bar::new(start + chrono::Duration::minutes(i as i64), o, h, l, c, 500.0))
        .collect()
}

fn long(entry: f64, stop: f64) -> OpenPosition {
    OpenPosition {
        entry_index: 0,
        side: Side::Long,
        entry,
        stop,
        refs: NO_REFS,
    }
}

fn untimed() -> TimeStopConfig {
    TimeStopConfig {
        mode: TimeStopMode::Disabled,
        ..TimeStopConfig::default()
    }
}

#[test]
fn tp1_then_tp2_realizes_one_and_a_half_r() {
    let b = bars(&[
        (100.0, 100.2, 99.8, 100.0),
        (100.0, 101.0, 99.9, 100.9),
        (100.9, 102.0, 100.4, 101.9),
    ]);
    let mgmt = ManagementConfig {
        tp1_r: 1.0,
        tp2_r: 2.0,
        scale_at_tp1: 0.5,
        move_to_be_on_tp1: true,
    };
    let out = manage_trade(&b, &long(100.0, 99.0), &mgmt, &untimed()).unwrap();
    assert!(out.tp1_hit);
    assert_eq!(out.exit_reason, ExitReason::Tp2RMultiple);
    assert!((out.realized_r - 1.5).abs() < 1e-12);
    assert_eq!(out.exit_price, 102.0);
}

#[test]
fn stop_before_tp1_is_minus_one_r_without_tp1_time() {
    let b = bars(&[
        (100.0, 100.2, 99.8, 100.0),
        (100.0, 100.3, 98.8, 99.1),
        (99.1, 101.5, 99.0, 101.2),
    ]);
    let out = manage_trade(&b, &long(100.0, 99.0), &ManagementConfig::default(), &untimed()).unwrap();
    assert_eq!(out.exit_reason, ExitReason::Stop);
    assert_eq!(out.realized_r, -1.0);
    assert_eq!(out.t_to_tp1_min, None);
}

#[test]
fn stop_and_tp2_on_same_bar_exit_at_stop() {
    let b = bars(&[(100.0, 100.2, 99.8, 100.0), (100.0, 103.0, 98.0, 100.0)]);
    let out = manage_trade(&b, &long(100.0, 99.0), &ManagementConfig::default(), &untimed()).unwrap();
    assert_eq!(out.exit_reason, ExitReason::Stop);
    assert_eq!(out.exit_index, 1);
}

#[test]
fn prior_day_high_wins_tp2_tie() {
    let b = bars(&[
        (100.0, 100.2, 99.8, 100.0),
        (100.0, 101.2, 99.9, 101.0),
        (101.0, 104.0, 100.8, 103.5),
    ]);
    let pos = OpenPosition {
        refs: TargetRefs {
            pdh: 103.0,
            pdl: f64::NAN,
            or_height: 3.5,
        },
        ..long(100.0, 99.0)
    };
    let out = manage_trade(&b, &pos, &ManagementConfig::default(), &untimed()).unwrap();
    let tp2 = out.tp2.unwrap();
    assert_eq!(tp2.label, Tp2Label::PdhPdl);
    assert_eq!(out.exit_reason, ExitReason::Tp2PdhPdl);
    assert_eq!(out.exit_price, 103.0);
    assert!((out.realized_r - (0.5 + 0.5 * 3.0)).abs() < 1e-12);
}

#[test]
fn stalled_trade_times_out_after_fifteen_minutes() {
    let mut ohlc = vec![(100.0, 100.3, 99.7, 100.0); 25];
    ohlc[15] = (100.0, 100.4, 99.6, 99.8);
    let b = bars(&ohlc);
    let cfg = TimeStopConfig {
        mode: TimeStopMode::Timeout,
        ..TimeStopConfig::default()
    };
    let out = manage_trade(&b, &long(100.0, 99.0), &ManagementConfig::default(), &cfg).unwrap();
    assert_eq!(out.exit_reason, ExitReason::NoTp115m);
    assert_eq!(out.time_stop, TimeStopTag::NoTp1);
    assert!((out.realized_r + 0.2).abs() < 1e-9);
}

#[test]
fn gap_at_next_open_rejects_despite_signal_time_check() {
    // Cap = 1.25 * 4.5 = 5.625. Risk is 5 at the signal close, 6 after the gap.
    let b = bars(&[(100.0, 100.5, 99.5, 100.0), (101.0, 101.5, 100.5, 101.0)]);
    let candidate = TradeCandidate {
        signal_index: 0,
        side: Side::Long,
        stop: 95.0,
        or_height: 4.5,
    };
    let frictionless = NoSlippage { tick_size: 0.25 };

    let at_close = admit(&b, &candidate, ExecutionMode::Close, 1.25, &frictionless).unwrap();
    assert!(matches!(at_close, Admission::Filled(_)));

    let at_open = admit(&b, &candidate, ExecutionMode::NextOpen, 1.25, &frictionless).unwrap();
    assert!(matches!(
        at_open,
        Admission::Rejected(Rejection::RiskCapExceeded { risk, .. }) if risk == 6.0
    ));
}

#[test]
fn short_trade_mirrors_long() {
    let b = bars(&[
        (100.0, 100.2, 99.8, 100.0),
        (100.0, 100.1, 98.9, 99.1),
        (99.1, 99.6, 97.9, 98.1),
    ]);
    let pos = OpenPosition {
        side: Side::Short,
        stop: 101.0,
        ..long(100.0, 101.0)
    };
    let out = manage_trade(&b, &pos, &ManagementConfig::default(), &untimed()).unwrap();
    assert_eq!(out.exit_reason, ExitReason::Tp2RMultiple);
    assert!((out.realized_r - 1.5).abs() < 1e-12);
}

#[test]
fn tp2_and_tp1_on_same_bar_exit_full_size_at_tp2() {
    let b = bars(&[(100.0, 100.2, 99.8, 100.0), (100.0, 102.2, 99.9, 101.5)]);
    let out = manage_trade(&b, &long(100.0, 99.0), &ManagementConfig::default(), &untimed()).unwrap();
    assert_eq!(out.exit_reason, ExitReason::Tp2RMultiple);
    assert_eq!(out.exit_index, 1);
    assert_eq!(out.exit_price, 102.0);
    assert_eq!(out.realized_r, 2.0);
    assert!(!out.tp1_hit);
    assert_eq!(out.t_to_tp1_min, None);
}

/// Entry bar, TP1 touch on bar 1, then a quiet runner above breakeven.
fn runner_session(len: usize) -> Vec<Bar> {
    let mut ohlc = vec![(101.0, 101.4, 100.6, 101.0); len];
    ohlc[0] = (100.0, 100.2, 99.8, 100.0);
    ohlc[1] = (100.0, 101.2, 100.1, 101.0);
    let mut b = bars(&ohlc);
    for bar in &mut b {
        bar.features.vwap = 100.5;
        bar.features.vwap_1d = 100.0;
        bar.features.vwap_1u = 101.0;
        bar.features.trend_5m = 1;
    }
    b
}

#[test]
fn trend_flip_breaks_extended_runner() {
    let mut b = runner_session(10);
    b[4].features.trend_5m = -1;
    let mgmt = ManagementConfig {
        tp2_r: 3.0,
        ..ManagementConfig::default()
    };
    let out = manage_trade(&b, &long(100.0, 99.0), &mgmt, &TimeStopConfig::default()).unwrap();
    assert!(out.tp1_hit);
    assert_eq!(out.exit_reason, ExitReason::ExtensionBreak);
    assert_eq!(out.time_stop, TimeStopTag::ExtensionBreak);
    assert_eq!(out.exit_index, 4);
    assert!((out.realized_r - 1.0).abs() < 1e-12);
}

#[test]
fn runner_without_extension_exits_at_holding_cap() {
    let mut b = runner_session(50);
    b[45].close = 101.3;
    let cfg = TimeStopConfig {
        allow_extension: false,
        ..TimeStopConfig::default()
    };
    let out = manage_trade(&b, &long(100.0, 99.0), &ManagementConfig::default(), &cfg).unwrap();
    assert!(out.tp1_hit);
    assert_eq!(out.exit_reason, ExitReason::MaxHold);
    assert_eq!(out.time_stop, TimeStopTag::MaxHold);
    assert_eq!(out.exit_index, 45);
    assert!((out.realized_r - 1.15).abs() < 1e-9);
}

#[test]
fn zero_timeout_exits_after_the_entry_bar() {
    let b = bars(&[
        (100.0, 100.2, 99.8, 100.0),
        (100.0, 100.3, 99.7, 100.1),
        (100.1, 100.3, 99.7, 100.2),
    ]);
    let cfg = TimeStopConfig {
        tp1_timeout_min: 0,
        max_holding_min: 0,
        ..TimeStopConfig::default()
    };
    let out = manage_trade(&b, &long(100.0, 99.0), &ManagementConfig::default(), &cfg).unwrap();
    assert_eq!(out.exit_reason, ExitReason::NoTp115m);
    assert_eq!(out.exit_index, 1);
    assert!((out.realized_r - 0.1).abs() < 1e-9);
}
