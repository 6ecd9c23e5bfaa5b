//! Trade simulation: signal rows in, finalized trades out.
//!
//! For every session that passes the session filters, each candidate bar
//! (`trigger_ok && riskcap_ok`) is admitted and, if filled, raced to its
//! exit over the remaining bars of the same session. Sessions share no
//! mutable state and run in parallel; output is in signal-time order.

pub mod classify;

use crate::config::StrategyConfig;
use crate::domain::{sessions, Bar, BarError, Session, Side, Trade};
use crate::filters::session_filter;
use crate::lifecycle::{
    admit, degenerate_outcome, manage_trade, Admission, Fill, LifecycleError, LifecycleOutcome,
    NoSlippage, OpenPosition, SlippageModel, TargetRefs, TickSlippage, TradeCandidate,
};
use crate::signals::SignalRow;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, trace};

pub use classify::{location, trigger_type};

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Bars(#[from] BarError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Slippage model described by the config; zero ticks everywhere is frictionless.
pub fn slippage_model(cfg: &StrategyConfig) -> Box<dyn SlippageModel> {
    let s = &cfg.slippage;
    if s.normal_ticks == 0 && s.hot_ticks == 0 {
        Box::new(NoSlippage { tick_size: s.tick_size })
    } else {
        Box::new(TickSlippage::from_config(s))
    }
}

/// Simulate every admissible entry and return the finalized trades.
pub fn simulate_trades(bars: &[Bar], signals: &[SignalRow], cfg: &StrategyConfig) -> Result<Vec<Trade>, EngineError> {
    if bars.len() != signals.len() {
        return Err(BarError::LengthMismatch {
            bars: bars.len(),
            signals: signals.len(),
        }
        .into());
    }
    let sessions = sessions(bars)?;
    let verdicts = session_filter(bars, &sessions, &cfg.filters);
    for (s, v) in sessions.iter().zip(&verdicts) {
        if let Some(reason) = v {
            debug!(date = %s.date, ?reason, "session skipped by filter");
        }
    }

    let slippage = slippage_model(cfg);
    let per_session: Vec<Vec<Trade>> = sessions
        .par_iter()
        .zip(verdicts.par_iter())
        .filter(|(_, verdict)| verdict.is_none())
        .map(|(session, _)| simulate_session(bars, signals, session, cfg, slippage.as_ref()))
        .collect::<Result<_, _>>()?;

    let trades: Vec<Trade> = per_session.into_iter().flatten().collect();
    debug!(
        sessions = sessions.len(),
        skipped = verdicts.iter().filter(|v| v.is_some()).count(),
        trades = trades.len(),
        "trades simulated"
    );
    Ok(trades)
}

fn simulate_session(
    bars: &[Bar],
    signals: &[SignalRow],
    session: &Session,
    cfg: &StrategyConfig,
    slippage: &dyn SlippageModel,
) -> Result<Vec<Trade>, EngineError> {
    let day = session.bars(bars);
    let rows = &signals[session.range.clone()];
    let mut trades = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        if !row.is_candidate() || row.direction == 0 || !row.stop_price.is_finite() {
            continue;
        }
        let side = Side::from_sign(row.direction).map_err(LifecycleError::from)?;
        let signal_bar = &day[i];
        let candidate = TradeCandidate {
            signal_index: i,
            side,
            stop: row.stop_price,
            or_height: signal_bar.features.opening_range_height(),
        };

        let (fill, degenerate) = match admit(day, &candidate, cfg.slippage.mode, cfg.risk.max_stop_or_mult, slippage)? {
            Admission::Filled(fill) => (fill, false),
            Admission::Degenerate(fill) => (fill, true),
            Admission::Rejected(why) => {
                trace!(date = %session.date, signal_index = i, ?why, "candidate rejected");
                continue;
            }
        };

        let position = OpenPosition {
            entry_index: fill.index,
            side,
            entry: fill.price,
            stop: candidate.stop,
            refs: TargetRefs {
                pdh: signal_bar.features.pdh,
                pdl: signal_bar.features.pdl,
                or_height: candidate.or_height,
            },
        };
        let outcome = if degenerate {
            degenerate_outcome(&position)
        } else {
            manage_trade(day, &position, &cfg.management, &cfg.time_stop)?
        };
        trades.push(build_trade(day, session, &candidate, &fill, &outcome, slippage.tick_size()));
    }
    Ok(trades)
}

fn build_trade(
    day: &[Bar],
    session: &Session,
    candidate: &TradeCandidate,
    fill: &Fill,
    outcome: &LifecycleOutcome,
    tick_size: f64,
) -> Trade {
    let signal_bar = &day[candidate.signal_index];
    let sl_ticks = if tick_size > 0.0 { fill.risk / tick_size } else { f64::NAN };
    Trade {
        date: session.date,
        signal_time: signal_bar.timestamp,
        entry_time: day[fill.index].timestamp,
        exit_time: day[outcome.exit_index].timestamp,
        side: candidate.side,
        entry: fill.price,
        stop: candidate.stop,
        tp1: outcome.tp1_price,
        tp2: outcome.tp2.map(|h| h.price),
        tp2_label: outcome.tp2.map(|h| h.label),
        or_height: candidate.or_height,
        sl_ticks,
        risk_r: 1.0,
        realized_r: outcome.realized_r,
        t_to_tp1_min: outcome.t_to_tp1_min,
        tp1_hit: outcome.tp1_hit,
        trigger_type: trigger_type(signal_bar, candidate.side),
        location: location(signal_bar, candidate.side),
        exit_price: outcome.exit_price,
        exit_reason: outcome.exit_reason,
        time_stop: outcome.time_stop,
        disqualifier: "none".to_string(),
        slippage_entry_ticks: fill.slippage_ticks,
        slippage_exit_ticks: 0,
    }
}
