//! Slippage models: adverse tick adjustment of the entry fill.
//!
//! Buyers pay up and sellers give up: a long fill moves up by the slipped
//! ticks, a short fill moves down. Exits are filled at their level.

use crate::config::SlippageConfig;
use crate::domain::Side;
use chrono::NaiveTime;

/// Slippage model: ticks charged for a fill at a given clock time.
pub trait SlippageModel: Send + Sync {
    /// Ticks of adverse slippage for a fill at `t`.
    fn ticks(&self, t: NaiveTime) -> u32;

    fn tick_size(&self) -> f64;

    /// Slipped fill price and the ticks charged.
    fn apply(&self, side: Side, t: NaiveTime, raw_price: f64) -> (f64, u32) {
        let ticks = self.ticks(t);
        let price = raw_price + side.sign() * f64::from(ticks) * self.tick_size();
        (price, ticks)
    }
}

/// Fixed tick count, raised inside a "hot" window around the open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSlippage {
    pub normal_ticks: u32,
    pub hot_ticks: u32,
    pub hot_start: NaiveTime,
    pub hot_end: NaiveTime,
    pub tick_size: f64,
}

impl TickSlippage {
    pub fn from_config(cfg: &SlippageConfig) -> Self {
        Self {
            normal_ticks: cfg.normal_ticks,
            hot_ticks: cfg.hot_ticks,
            hot_start: cfg.hot_start,
            hot_end: cfg.hot_end,
            tick_size: cfg.tick_size,
        }
    }

    pub fn is_hot(&self, t: NaiveTime) -> bool {
        self.hot_start <= t && t < self.hot_end
    }
}

impl SlippageModel for TickSlippage {
    fn ticks(&self, t: NaiveTime) -> u32 {
        if self.is_hot(t) {
            self.hot_ticks
        } else {
            self.normal_ticks
        }
    }

    fn tick_size(&self) -> f64 {
        self.tick_size
    }
}

/// Frictionless fills.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoSlippage {
    pub tick_size: f64,
}

impl SlippageModel for NoSlippage {
    fn ticks(&self, _t: NaiveTime) -> u32 {
        0
    }

    fn tick_size(&self) -> f64 {
        self.tick_size
    }
}
