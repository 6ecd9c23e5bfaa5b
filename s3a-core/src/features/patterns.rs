//! Two-bar engulfing candles.

use crate::domain::Bar;

/// +1 bullish engulfing, -1 bearish engulfing, 0 otherwise.
///
/// Bullish: previous bar bearish, current bullish, current body covers the
/// previous body (`open <= prev_close`, `close >= prev_open`).
pub fn engulfing(bars: &[Bar]) -> Vec<i8> {
    let mut out = vec![0i8; bars.len()];
    for i in 1..bars.len() {
        let (p, c) = (&bars[i - 1], &bars[i]);
        let bull = p.close < p.open && c.close > c.open && c.open <= p.close && c.close >= p.open;
        let bear = p.close > p.open && c.close < c.open && c.open >= p.close && c.close <= p.open;
        out[i] = if bull {
            1
        } else if bear {
            -1
        } else {
            0
        };
    }
    out
}
