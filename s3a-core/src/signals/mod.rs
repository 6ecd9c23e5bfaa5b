//! Signal state machine: per-bar unlock, zone, trigger and disqualification.
//!
//! Sessions are independent, so each is folded with a fresh
//! [`SessionState`] and the sessions run in parallel. Output is one
//! [`SignalRow`] per input bar, in input order.

pub mod row;
pub mod state;

pub use row::SignalRow;
pub use state::{proposed_stop, SessionState, SignalRules};

use crate::config::StrategyConfig;
use crate::domain::{sessions, Bar, BarError, BarFeatures};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Price-like feature columns the state machine cannot run without.
const REQUIRED_COLUMNS: [(&str, fn(&BarFeatures) -> f64); 7] = [
    ("or_high", |f| f.or_high),
    ("or_low", |f| f.or_low),
    ("vwap", |f| f.vwap),
    ("vwap_1u", |f| f.vwap_1u),
    ("vwap_1d", |f| f.vwap_1d),
    ("vwap_2u", |f| f.vwap_2u),
    ("vwap_2d", |f| f.vwap_2d),
];

/// Names of required columns that carry no finite value on any bar.
pub fn missing_columns(bars: &[Bar]) -> Vec<&'static str> {
    let mut missing: Vec<&'static str> = REQUIRED_COLUMNS
        .iter()
        .filter(|(_, get)| !bars.iter().any(|b| get(&b.features).is_finite()))
        .map(|(name, _)| *name)
        .collect();
    if !bars.iter().any(|b| b.close.is_finite()) {
        missing.insert(0, "close");
    }
    missing
}

/// Run the state machine over every session.
///
/// Missing feature columns degrade to all-default rows rather than an
/// error; out-of-order timestamps are an error.
pub fn generate_signals(bars: &[Bar], cfg: &StrategyConfig) -> Result<Vec<SignalRow>, BarError> {
    let sessions = sessions(bars)?;
    if bars.is_empty() {
        return Ok(Vec::new());
    }

    let missing = missing_columns(bars);
    if !missing.is_empty() {
        warn!(?missing, "required feature columns absent, emitting default signal rows");
        return Ok(vec![SignalRow::default(); bars.len()]);
    }

    let rules = SignalRules::from_config(cfg);
    let per_session: Vec<Vec<SignalRow>> = sessions
        .par_iter()
        .map(|s| {
            let mut state = SessionState::new();
            s.bars(bars)
                .iter()
                .enumerate()
                .map(|(i, bar)| state.step(i, bar, &rules))
                .collect()
        })
        .collect();

    let rows: Vec<SignalRow> = per_session.into_iter().flatten().collect();
    debug!(
        sessions = sessions.len(),
        unlocks = rows.iter().filter(|r| r.or_break_unlock).count(),
        triggers = rows.iter().filter(|r| r.trigger_ok).count(),
        "signals generated"
    );
    Ok(rows)
}
