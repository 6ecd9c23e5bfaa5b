//! Profit targets: TP1 and the multi-candidate TP2.

use super::first_touch::{earliest, first_touch, Ranked, Touch};
use crate::domain::{Bar, Side, Tp2Label};

impl Ranked for Tp2Label {
    fn rank(&self) -> u8 {
        self.priority()
    }
}

/// Read-only session references feeding the TP2 candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetRefs {
    pub pdh: f64,
    pub pdl: f64,
    pub or_height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tp1 {
    pub price: f64,
    pub index: Option<usize>,
}

/// TP1 at `entry + side * tp1_r * risk`.
pub fn tp1(session: &[Bar], entry_index: usize, side: Side, entry: f64, risk: f64, tp1_r: f64) -> Tp1 {
    let price = entry + side.sign() * tp1_r * risk;
    Tp1 {
        price,
        index: first_touch(session, price, side, entry_index, Touch::Profit),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tp2Candidate {
    pub label: Tp2Label,
    pub price: f64,
    pub index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tp2Hit {
    pub label: Tp2Label,
    pub price: f64,
    pub index: usize,
}

/// Every applicable TP2 level with its first touch.
///
/// Prior-day high/low only counts when it lies beyond the entry in the
/// trade's direction; the measured move needs a positive OR height.
pub fn tp2_candidates(
    session: &[Bar],
    entry_index: usize,
    side: Side,
    entry: f64,
    risk: f64,
    tp2_r: f64,
    refs: &TargetRefs,
) -> Vec<Tp2Candidate> {
    let mut levels = Vec::with_capacity(3);

    let prior = match side {
        Side::Long => refs.pdh,
        Side::Short => refs.pdl,
    };
    if prior.is_finite() && side.sign() * (prior - entry) > 0.0 {
        levels.push((Tp2Label::PdhPdl, prior));
    }
    if refs.or_height.is_finite() && refs.or_height > 0.0 {
        levels.push((Tp2Label::MeasuredMove, entry + side.sign() * refs.or_height));
    }
    if risk.is_finite() && risk > 0.0 {
        levels.push((Tp2Label::RMultiple, entry + side.sign() * tp2_r * risk));
    }

    levels
        .into_iter()
        .map(|(label, price)| Tp2Candidate {
            label,
            price,
            index: first_touch(session, price, side, entry_index, Touch::Profit),
        })
        .collect()
}

/// Earliest-hitting candidate; same-bar ties go to PDH/PDL, then measured
/// move, then R-multiple.
pub fn resolve_tp2(candidates: &[Tp2Candidate]) -> Option<Tp2Hit> {
    let (index, label) = earliest(candidates.iter().map(|c| (c.index, c.label)))?;
    let price = candidates.iter().find(|c| c.label == label)?.price;
    Some(Tp2Hit { label, price, index })
}
