//! Descriptive tags attached to a trade from its signal bar.

use crate::domain::{Bar, Location, Side, TriggerType};

/// Which pattern fired the trigger; a micro-break wins over engulfing.
pub fn trigger_type(bar: &Bar, side: Side) -> TriggerType {
    let code = side.code();
    if bar.features.micro_break_dir == code {
        TriggerType::Swingbreak
    } else if bar.features.engulf_dir == code {
        TriggerType::Engulf
    } else {
        TriggerType::Unknown
    }
}

/// Nearer band edge when the close sits inside the pullback zone.
///
/// Long zone is `[vwap, vwap_1u]`, short zone `[vwap_1d, vwap]`. Equidistant
/// closes count as VWAP.
pub fn location(bar: &Bar, side: Side) -> Location {
    let f = &bar.features;
    let close = bar.close;
    let (edge, tag) = match side {
        Side::Long => (f.vwap_1u, Location::PlusOneSigma),
        Side::Short => (f.vwap_1d, Location::MinusOneSigma),
    };
    let (lo, hi) = if f.vwap <= edge { (f.vwap, edge) } else { (edge, f.vwap) };
    if !(lo <= close && close <= hi) {
        return Location::None;
    }
    if (close - f.vwap).abs() <= (close - edge).abs() {
        Location::Vwap
    } else {
        tag
    }
}
