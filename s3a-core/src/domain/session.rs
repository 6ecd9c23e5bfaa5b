//! Session grouping: contiguous bar ranges sharing a calendar date.
//!
//! A session is the unit of state reset for the signal state machine.
//! Grouping requires the input to be strictly time-ordered.

use super::bar::{ensure_monotonic, Bar, BarError};
use chrono::{NaiveDate, NaiveTime};
use std::ops::Range;

/// Regular-trading-hours open (exchange local).
pub const RTH_OPEN: NaiveTime = match NaiveTime::from_hms_opt(9, 30, 0) {
    Some(t) => t,
    None => NaiveTime::MIN,
};

/// Regular-trading-hours close (exclusive).
pub const RTH_CLOSE: NaiveTime = match NaiveTime::from_hms_opt(16, 0, 0) {
    Some(t) => t,
    None => NaiveTime::MIN,
};

/// Minute bars in a complete RTH session.
pub const RTH_MINUTES: usize = 390;

/// A contiguous slice of bars belonging to one trading day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub date: NaiveDate,
    /// Index range into the full bar sequence.
    pub range: Range<usize>,
}

impl Session {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn first(&self) -> usize {
        self.range.start
    }

    /// Index of the last bar in the session.
    pub fn last(&self) -> usize {
        self.range.end.saturating_sub(1)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.range.contains(&index)
    }

    pub fn bars<'a>(&self, all: &'a [Bar]) -> &'a [Bar] {
        &all[self.range.clone()]
    }
}

/// Split a time-ordered bar sequence into sessions by calendar date.
pub fn sessions(bars: &[Bar]) -> Result<Vec<Session>, BarError> {
    ensure_monotonic(bars)?;
    Ok(split_by_date(bars))
}

/// Grouping without the ordering check, for callers that already validated.
pub(crate) fn split_by_date(bars: &[Bar]) -> Vec<Session> {
    let mut out: Vec<Session> = Vec::new();
    let mut start = 0;
    for i in 1..=bars.len() {
        let boundary = i == bars.len() || bars[i].session_date() != bars[start].session_date();
        if boundary {
            out.push(Session {
                date: bars[start].session_date(),
                range: start..i,
            });
            start = i;
        }
    }
    out
}

/// Map each bar index to its session position in `sessions`.
pub fn session_index(sessions: &[Session], n_bars: usize) -> Vec<usize> {
    let mut out = vec![0; n_bars];
    for (k, s) in sessions.iter().enumerate() {
        for slot in &mut out[s.range.clone()] {
            *slot = k;
        }
    }
    out
}
