//! Exit race for an admitted trade.
//!
//! Before TP1 the original stop, TP2, the time stop and TP1 race; the
//! earliest bar wins and same-bar ties resolve `stop < tp2 < time_stop < tp1`.
//! When TP1 wins, the scaled-out fraction is booked at `tp1_r` and the
//! runner races again strictly after the TP1 bar with the (possibly
//! breakeven) stop.

use super::first_touch::{earliest, first_touch, Ranked, Touch};
use super::targets::{resolve_tp2, tp1, tp2_candidates, TargetRefs, Tp2Hit};
use super::time_stop::{run_time_stop, ExtensionConditions, TimeStopHit};
use super::LifecycleError;
use crate::config::{ManagementConfig, TimeStopConfig};
use crate::domain::{Bar, ExitReason, Side, TimeStopTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RaceEvent {
    Stop,
    Tp2,
    TimeStop,
    Tp1,
}

impl Ranked for RaceEvent {
    fn rank(&self) -> u8 {
        match self {
            RaceEvent::Stop => 0,
            RaceEvent::Tp2 => 1,
            RaceEvent::TimeStop => 2,
            RaceEvent::Tp1 => 3,
        }
    }
}

/// Inputs describing one filled position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenPosition {
    /// Index of the fill bar within the session.
    pub entry_index: usize,
    pub side: Side,
    pub entry: f64,
    pub stop: f64,
    pub refs: TargetRefs,
}

/// Resolved exit of a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LifecycleOutcome {
    pub exit_index: usize,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub realized_r: f64,
    pub tp1_price: f64,
    pub tp1_hit: bool,
    pub t_to_tp1_min: Option<f64>,
    pub tp2: Option<Tp2Hit>,
    pub time_stop: TimeStopTag,
}

/// Flat exit at entry for zero or non-finite risk.
pub fn degenerate_outcome(position: &OpenPosition) -> LifecycleOutcome {
    LifecycleOutcome {
        exit_index: position.entry_index,
        exit_price: position.entry,
        exit_reason: ExitReason::DegenerateRisk,
        realized_r: 0.0,
        tp1_price: position.entry,
        tp1_hit: false,
        t_to_tp1_min: None,
        tp2: None,
        time_stop: TimeStopTag::None,
    }
}

struct Leg {
    index: usize,
    price: f64,
    reason: ExitReason,
    time_stop: TimeStopTag,
}

/// Price and reason for a non-TP1 race winner.
fn settle(
    session: &[Bar],
    event: RaceEvent,
    index: usize,
    stop: f64,
    tp2: Option<Tp2Hit>,
    time_stop: Option<TimeStopHit>,
) -> Leg {
    match (event, tp2, time_stop) {
        (RaceEvent::Tp2, Some(hit), _) => Leg {
            index,
            price: hit.price,
            reason: hit.label.into(),
            time_stop: TimeStopTag::None,
        },
        (RaceEvent::TimeStop, _, Some(ts)) => Leg {
            index,
            price: session[index].close,
            reason: ExitReason::from_time_stop(ts.tag).unwrap_or(ExitReason::MaxHold),
            time_stop: ts.tag,
        },
        _ => Leg {
            index,
            price: stop,
            reason: ExitReason::Stop,
            time_stop: TimeStopTag::None,
        },
    }
}

/// Mark-to-market at the session's last bar when nothing fired.
fn hold_to_close(session: &[Bar]) -> Leg {
    let index = session.len() - 1;
    Leg {
        index,
        price: session[index].close,
        reason: ExitReason::NoEvent,
        time_stop: TimeStopTag::None,
    }
}

/// Run the full race over the session bars.
pub fn manage_trade(
    session: &[Bar],
    position: &OpenPosition,
    mgmt: &ManagementConfig,
    time_cfg: &TimeStopConfig,
) -> Result<LifecycleOutcome, LifecycleError> {
    let entry_index = position.entry_index;
    if entry_index >= session.len() {
        return Err(LifecycleError::IndexOutOfRange {
            index: entry_index,
            len: session.len(),
        });
    }
    let side = position.side;
    let entry = position.entry;
    let stop = position.stop;
    let risk = (entry - stop).abs();
    if !(risk.is_finite() && risk > 0.0) {
        return Ok(degenerate_outcome(position));
    }
    let r_of = |price: f64| side.sign() * (price - entry) / risk;

    let stop_index = first_touch(session, stop, side, entry_index, Touch::Stop);
    let tp1 = tp1(session, entry_index, side, entry, risk, mgmt.tp1_r);
    let tp2 = resolve_tp2(&tp2_candidates(
        session,
        entry_index,
        side,
        entry,
        risk,
        mgmt.tp2_r,
        &position.refs,
    ));
    let conditions = ExtensionConditions::build(session, entry_index, side, entry, risk);
    let time_stop = run_time_stop(session, entry_index, tp1.index, time_cfg, &conditions);

    let first = earliest([
        (stop_index, RaceEvent::Stop),
        (tp2.map(|h| h.index), RaceEvent::Tp2),
        (time_stop.map(|h| h.index), RaceEvent::TimeStop),
        (tp1.index, RaceEvent::Tp1),
    ]);

    let base = LifecycleOutcome {
        exit_index: entry_index,
        exit_price: entry,
        exit_reason: ExitReason::NoEvent,
        realized_r: 0.0,
        tp1_price: tp1.price,
        tp1_hit: false,
        t_to_tp1_min: None,
        tp2,
        time_stop: TimeStopTag::None,
    };

    let tp1_index = match first {
        None => {
            let leg = hold_to_close(session);
            return Ok(LifecycleOutcome {
                exit_index: leg.index,
                exit_price: leg.price,
                exit_reason: leg.reason,
                realized_r: r_of(leg.price),
                ..base
            });
        }
        Some((index, RaceEvent::Tp1)) => index,
        Some((index, event)) => {
            let leg = settle(session, event, index, stop, tp2, time_stop);
            return Ok(LifecycleOutcome {
                exit_index: leg.index,
                exit_price: leg.price,
                exit_reason: leg.reason,
                realized_r: r_of(leg.price),
                time_stop: leg.time_stop,
                ..base
            });
        }
    };

    // ── Runner ──
    let scale = mgmt.scale_at_tp1;
    let runner_stop = if mgmt.move_to_be_on_tp1 { entry } else { stop };
    let runner_stop_index = first_touch(session, runner_stop, side, tp1_index, Touch::Stop);
    let after_tp1 = |i: usize| i > tp1_index;
    let runner_tp2 = tp2.filter(|h| after_tp1(h.index));
    let runner_ts = time_stop.filter(|h| after_tp1(h.index));

    let leg = match earliest([
        (runner_stop_index, RaceEvent::Stop),
        (runner_tp2.map(|h| h.index), RaceEvent::Tp2),
        (runner_ts.map(|h| h.index), RaceEvent::TimeStop),
    ]) {
        Some((index, event)) => settle(session, event, index, runner_stop, runner_tp2, runner_ts),
        None => hold_to_close(session),
    };

    let minutes = (session[tp1_index].timestamp - session[entry_index].timestamp).num_seconds() as f64 / 60.0;
    Ok(LifecycleOutcome {
        exit_index: leg.index,
        exit_price: leg.price,
        exit_reason: leg.reason,
        realized_r: scale * mgmt.tp1_r + (1.0 - scale) * r_of(leg.price),
        tp1_hit: true,
        t_to_tp1_min: Some(minutes),
        time_stop: leg.time_stop,
        ..base
    })
}
