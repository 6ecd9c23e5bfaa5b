//! Trade lifecycle: admission, targets, time stops and the exit race.
//!
//! All indices in this module are session-local: `session[0]` is the first
//! bar of the trading day and nothing reaches across a session boundary.

pub mod admission;
pub mod first_touch;
pub mod manager;
pub mod slippage;
pub mod targets;
pub mod time_stop;

use crate::domain::SideError;
use thiserror::Error;

pub use admission::{admit, Admission, Fill, Rejection, TradeCandidate};
pub use first_touch::{earliest, first_touch, Ranked, Touch};
pub use manager::{degenerate_outcome, manage_trade, LifecycleOutcome, OpenPosition};
pub use slippage::{NoSlippage, SlippageModel, TickSlippage};
pub use targets::{resolve_tp2, tp1, tp2_candidates, TargetRefs, Tp1, Tp2Candidate, Tp2Hit};
pub use time_stop::{run_time_stop, ExtensionConditions, TimeStopHit, MAX_EXTENSION_DRAWDOWN_R};

#[derive(Debug, Error, PartialEq)]
pub enum LifecycleError {
    #[error("bar index {index} out of range for session of {len} bars")]
    IndexOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    InvalidSide(#[from] SideError),
}
