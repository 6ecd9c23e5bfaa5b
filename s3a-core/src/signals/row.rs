//! SignalRow: per-bar output of the signal state machine.

use serde::{Deserialize, Serialize};

/// Flags describing a session's progress through unlock, zone and trigger
/// at one bar.
///
/// Event flags (`or_break_unlock`, `in_zone`) are true on a single bar per
/// session at most; state flags (`unlocked`, `disqualified`, `zone_seen`)
/// latch and stay true for the rest of the session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalRow {
    pub time_window_ok: bool,
    pub or_break_unlock: bool,
    pub unlocked: bool,
    /// -1/0/+1, fixed at the unlock bar; 0 before it.
    pub direction: i8,
    pub disqualified: bool,
    pub in_zone: bool,
    pub zone_seen: bool,
    pub zone_recent: bool,
    pub trigger_ok: bool,
    /// One tick beyond the last confirmed swing extreme, NaN when unknown.
    pub stop_price: f64,
    pub riskcap_ok: bool,
}

impl Default for SignalRow {
    fn default() -> Self {
        Self {
            time_window_ok: false,
            or_break_unlock: false,
            unlocked: false,
            direction: 0,
            disqualified: false,
            in_zone: false,
            zone_seen: false,
            zone_recent: false,
            trigger_ok: false,
            stop_price: f64::NAN,
            riskcap_ok: false,
        }
    }
}

impl SignalRow {
    /// Bar qualifies as a trade candidate before session filters.
    pub fn is_candidate(&self) -> bool {
        self.trigger_ok && self.riskcap_ok
    }
}
