//! Session VWAP with standard-deviation envelope.
//!
//! VWAP accumulates close × volume from the session's first bar. The band
//! width σ is the expanding sample standard deviation of close within the
//! session (0 on the first bar), so bands widen as the session unfolds.

use crate::domain::Bar;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VwapBands {
    pub vwap: Vec<f64>,
    pub sigma: Vec<f64>,
}

impl VwapBands {
    pub fn band(&self, i: usize, k: f64) -> f64 {
        self.vwap[i] + k * self.sigma[i]
    }
}

/// Bands for a single session slice.
pub fn session_vwap(bars: &[Bar]) -> VwapBands {
    let n = bars.len();
    let mut vwap = vec![f64::NAN; n];
    let mut sigma = vec![f64::NAN; n];

    let mut pv = 0.0;
    let mut vol = 0.0;
    // Welford accumulators over close.
    let mut count = 0usize;
    let mut mean = 0.0;
    let mut m2 = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        let close = bar.close;
        if close.is_finite() {
            let v = if bar.volume.is_finite() { bar.volume } else { 0.0 };
            pv += close * v;
            vol += v;

            count += 1;
            let delta = close - mean;
            mean += delta / count as f64;
            m2 += delta * (close - mean);
        }
        if vol > 0.0 {
            vwap[i] = pv / vol;
        }
        sigma[i] = if count > 1 {
            (m2 / (count - 1) as f64).sqrt()
        } else {
            0.0
        };
    }
    VwapBands { vwap, sigma }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::make_bars;

    #[test]
    fn vwap_weights_by_volume() {
        let mut bars = make_bars(&[100.0, 110.0]);
        bars[0].volume = 3.0;
        bars[1].volume = 1.0;
        let b = session_vwap(&bars);
        assert_eq!(b.vwap[0], 100.0);
        assert!((b.vwap[1] - 102.5).abs() < 1e-12);
    }

    #[test]
    fn sigma_is_sample_std_and_zero_first() {
        let bars = make_bars(&[100.0, 102.0, 104.0]);
        let b = session_vwap(&bars);
        assert_eq!(b.sigma[0], 0.0);
        assert!((b.sigma[1] - 2.0_f64.sqrt()).abs() < 1e-12);
        assert!((b.sigma[2] - 2.0).abs() < 1e-12);
        assert!((b.band(2, 2.0) - (b.vwap[2] + 4.0)).abs() < 1e-12);
    }

    #[test]
    fn zero_volume_leaves_vwap_missing() {
        let mut bars = make_bars(&[100.0]);
        bars[0].volume = 0.0;
        assert!(session_vwap(&bars).vwap[0].is_nan());
    }
}
