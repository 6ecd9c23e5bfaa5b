//! First-touch search and earliest-wins ranking.
//!
//! Every exit event in the lifecycle is "the first bar strictly after some
//! start index where price reached a level". Concurrent events are then
//! resolved by `(bar_index, rank)`: the earliest bar wins and a fixed rank
//! breaks ties on the same bar.

use crate::domain::{Bar, Side};

/// Which side of a level counts as a touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Touch {
    /// Level in the trade's favor: long needs `high >= level`, short `low <= level`.
    Profit,
    /// Level against the trade: long needs `low <= level`, short `high >= level`.
    Stop,
}

/// Index of the first bar after `start` that touches `level`.
///
/// Scans `bars[start + 1..]`; a NaN level or NaN bar extreme never touches.
pub fn first_touch(bars: &[Bar], level: f64, side: Side, start: usize, touch: Touch) -> Option<usize> {
    if level.is_nan() {
        return None;
    }
    let from = start.checked_add(1)?;
    if from >= bars.len() {
        return None;
    }
    let hit = |b: &Bar| match (side, touch) {
        (Side::Long, Touch::Profit) | (Side::Short, Touch::Stop) => b.high >= level,
        (Side::Short, Touch::Profit) | (Side::Long, Touch::Stop) => b.low <= level,
    };
    bars[from..].iter().position(hit).map(|p| from + p)
}

/// Fixed tie-break order for events landing on the same bar (lower wins).
pub trait Ranked {
    fn rank(&self) -> u8;
}

/// Earliest event among those that fired, ties broken by rank.
pub fn earliest<T, I>(events: I) -> Option<(usize, T)>
where
    T: Ranked,
    I: IntoIterator<Item = (Option<usize>, T)>,
{
    events
        .into_iter()
        .filter_map(|(index, event)| index.map(|i| (i, event)))
        .min_by_key(|(i, event)| (*i, event.rank()))
}
