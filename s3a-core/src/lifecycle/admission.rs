//! Entry admission: fill price, slippage and the gap-risk re-check.
//!
//! The risk cap was checked against the signal bar's close. The actual fill
//! may be the next bar's open plus slippage, so the stop distance is
//! recomputed from the slipped price and the cap applied again.

use super::slippage::SlippageModel;
use super::LifecycleError;
use crate::config::ExecutionMode;
use crate::domain::{Bar, Side};

/// A trigger bar that passed the signal-time checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeCandidate {
    /// Index of the signal bar within its session.
    pub signal_index: usize,
    pub side: Side,
    pub stop: f64,
    pub or_height: f64,
}

/// Executed entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    /// Index of the fill bar within the session.
    pub index: usize,
    pub raw_price: f64,
    pub price: f64,
    pub slippage_ticks: u32,
    /// `|price - stop|`.
    pub risk: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// `next_open` on the session's last bar.
    NoFillBar,
    NonFinitePrice,
    MissingOrHeight,
    RiskCapExceeded { risk: f64, cap: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Filled(Fill),
    /// Zero or non-finite risk: recorded as a flat trade, never divided by.
    Degenerate(Fill),
    Rejected(Rejection),
}

/// Decide whether and where a candidate enters.
pub fn admit(
    session: &[Bar],
    candidate: &TradeCandidate,
    mode: ExecutionMode,
    max_stop_or_mult: f64,
    slippage: &dyn SlippageModel,
) -> Result<Admission, LifecycleError> {
    let signal = candidate.signal_index;
    if signal >= session.len() {
        return Err(LifecycleError::IndexOutOfRange {
            index: signal,
            len: session.len(),
        });
    }

    let (index, raw_price) = match mode {
        ExecutionMode::Close => (signal, session[signal].close),
        ExecutionMode::NextOpen => match session.get(signal + 1) {
            Some(next) => (signal + 1, next.open),
            None => return Ok(Admission::Rejected(Rejection::NoFillBar)),
        },
    };
    if !raw_price.is_finite() {
        return Ok(Admission::Rejected(Rejection::NonFinitePrice));
    }

    let (price, slippage_ticks) = slippage.apply(candidate.side, session[index].clock(), raw_price);
    let risk = (price - candidate.stop).abs();
    let fill = Fill {
        index,
        raw_price,
        price,
        slippage_ticks,
        risk,
    };
    if !(risk.is_finite() && risk > 0.0) {
        return Ok(Admission::Degenerate(fill));
    }

    let or_height = candidate.or_height;
    if !(or_height.is_finite() && or_height > 0.0) {
        return Ok(Admission::Rejected(Rejection::MissingOrHeight));
    }
    let cap = max_stop_or_mult * or_height;
    if risk > cap {
        return Ok(Admission::Rejected(Rejection::RiskCapExceeded { risk, cap }));
    }
    Ok(Admission::Filled(fill))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::make_bars;
    use crate::lifecycle::slippage::{NoSlippage, TickSlippage};
    use crate::config::SlippageConfig;

    const FRICTIONLESS: NoSlippage = NoSlippage { tick_size: 0.25 };

    fn candidate(stop: f64) -> TradeCandidate {
        TradeCandidate {
            signal_index: 0,
            side: Side::Long,
            stop,
            or_height: 20.0,
        }
    }

    #[test]
    fn close_mode_fills_on_signal_bar() {
        let bars = make_bars(&[100.0, 105.0]);
        let a = admit(&bars, &candidate(95.0), ExecutionMode::Close, 1.25, &FRICTIONLESS).unwrap();
        match a {
            Admission::Filled(f) => {
                assert_eq!(f.index, 0);
                assert_eq!(f.price, 100.0);
                assert_eq!(f.risk, 5.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn next_open_applies_slippage() {
        let mut bars = make_bars(&[100.0, 105.0]);
        bars[1].open = 101.0;
        let slip = TickSlippage::from_config(&SlippageConfig::default());
        let a = admit(&bars, &candidate(95.0), ExecutionMode::NextOpen, 1.25, &slip).unwrap();
        // 09:31 is inside the hot window: two ticks.
        match a {
            Admission::Filled(f) => {
                assert_eq!(f.index, 1);
                assert_eq!(f.price, 101.5);
                assert_eq!(f.slippage_ticks, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn gap_beyond_cap_is_rejected() {
        let mut bars = make_bars(&[100.0, 130.0]);
        bars[1].open = 125.0;
        let a = admit(&bars, &candidate(95.0), ExecutionMode::NextOpen, 1.25, &FRICTIONLESS).unwrap();
        assert_eq!(
            a,
            Admission::Rejected(Rejection::RiskCapExceeded {
                risk: 30.0,
                cap: 25.0
            })
        );
    }

    #[test]
    fn last_bar_has_no_next_open() {
        let bars = make_bars(&[100.0]);
        let a = admit(&bars, &candidate(95.0), ExecutionMode::NextOpen, 1.25, &FRICTIONLESS).unwrap();
        assert_eq!(a, Admission::Rejected(Rejection::NoFillBar));
    }

    #[test]
    fn zero_risk_is_degenerate() {
        let bars = make_bars(&[100.0]);
        let a = admit(&bars, &candidate(100.0), ExecutionMode::Close, 1.25, &FRICTIONLESS).unwrap();
        assert!(matches!(a, Admission::Degenerate(f) if f.risk == 0.0));
    }

    #[test]
    fn out_of_range_signal_is_an_error() {
        let bars = make_bars(&[100.0]);
        let mut c = candidate(95.0);
        c.signal_index = 3;
        assert!(admit(&bars, &c, ExecutionMode::Close, 1.25, &FRICTIONLESS).is_err());
    }
}
