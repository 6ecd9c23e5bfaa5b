//! Strategy configuration: every recognized option with its default.
//!
//! Loaded from TOML by the runner; unknown keys are rejected at every level
//! and [`StrategyConfig::validate`] runs before the config reaches any
//! computation.

use crate::domain::ConfigHash;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard ceiling on the stop-distance / opening-range multiple.
pub const MAX_STOP_OR_MULT_LIMIT: f64 = 1.25;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("entry window start {start} must be before end {end}")]
    EntryWindowOrder { start: NaiveTime, end: NaiveTime },

    #[error("slippage hot window start {start} must be before end {end}")]
    HotWindowOrder { start: NaiveTime, end: NaiveTime },

    #[error("risk.max_stop_or_mult must be in (0, 1.25], got {0}")]
    RiskCap(f64),

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must be a positive window length, got 0")]
    ZeroWindow { field: &'static str },

    #[error("time_stop.max_holding_min ({max_holding_min}) must not be shorter than tp1_timeout_min ({tp1_timeout_min})")]
    HoldingBeforeTimeout { tp1_timeout_min: u32, max_holding_min: u32 },

    #[error("management.scale_at_tp1 must be within [0, 1], got {0}")]
    ScaleOutOfRange(f64),

    #[error("filters.low_atr_percentile must be within [0, 100], got {0}")]
    PercentileOutOfRange(f64),
}

/// `"HH:MM"` clock times in config files.
mod clock {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|e| D::Error::custom(format!("invalid clock time {raw:?}: {e}")))
    }
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

// ── Sections ──

/// Clock window in which unlocks and triggers are accepted: `start <= t < end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntryWindow {
    #[serde(with = "clock")]
    pub start: NaiveTime,
    #[serde(with = "clock")]
    pub end: NaiveTime,
}

impl Default for EntryWindow {
    fn default() -> Self {
        Self {
            start: hm(9, 35),
            end: hm(11, 0),
        }
    }
}

impl EntryWindow {
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start <= t && t < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeStopMode {
    #[default]
    #[serde(rename = "15m")]
    Timeout,
    #[serde(rename = "none")]
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeStopConfig {
    pub mode: TimeStopMode,
    pub tp1_timeout_min: u32,
    pub max_holding_min: u32,
    pub allow_extension: bool,
}

impl Default for TimeStopConfig {
    fn default() -> Self {
        Self {
            mode: TimeStopMode::Timeout,
            tp1_timeout_min: 15,
            max_holding_min: 45,
            allow_extension: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskConfig {
    pub max_stop_or_mult: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_stop_or_mult: MAX_STOP_OR_MULT_LIMIT,
        }
    }
}

/// Which price the entry fills at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Signal bar's close.
    Close,
    /// Following bar's open, same session only.
    #[default]
    NextOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlippageConfig {
    pub mode: ExecutionMode,
    pub normal_ticks: u32,
    pub hot_ticks: u32,
    #[serde(with = "clock")]
    pub hot_start: NaiveTime,
    #[serde(with = "clock")]
    pub hot_end: NaiveTime,
    pub tick_size: f64,
}

impl Default for SlippageConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::NextOpen,
            normal_ticks: 1,
            hot_ticks: 2,
            hot_start: hm(9, 30),
            hot_end: hm(9, 40),
            tick_size: 0.25,
        }
    }
}

/// How a pullback bar is judged to have reached the VWAP zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneTouchMode {
    /// Close lies inside the band.
    Close,
    /// Bar's [low, high] overlaps the band.
    #[default]
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignalsConfig {
    /// Only 2σ breaches at or after the unlock bar disqualify the session.
    pub disqualify_after_unlock: bool,
    pub zone_touch_mode: ZoneTouchMode,
    pub trigger_lookback_bars: u32,
    /// Unlock also requires close on the trend side of VWAP.
    pub require_vwap_side: bool,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            disqualify_after_unlock: true,
            zone_touch_mode: ZoneTouchMode::Range,
            trigger_lookback_bars: 5,
            require_vwap_side: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagementConfig {
    #[serde(alias = "tp1_R")]
    pub tp1_r: f64,
    #[serde(alias = "tp2_R")]
    pub tp2_r: f64,
    pub scale_at_tp1: f64,
    #[serde(alias = "move_to_BE_on_tp1")]
    pub move_to_be_on_tp1: bool,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            tp1_r: 1.0,
            tp2_r: 2.0,
            scale_at_tp1: 0.5,
            move_to_be_on_tp1: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FiltersConfig {
    #[serde(alias = "skip_tiny_or")]
    pub enable_tiny_or: bool,
    pub tiny_or_mult: f64,
    pub enable_low_atr: bool,
    pub low_atr_percentile: f64,
    #[serde(alias = "news_blackout")]
    pub enable_news_blackout: bool,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            enable_tiny_or: true,
            tiny_or_mult: 0.25,
            enable_low_atr: true,
            low_atr_percentile: 20.0,
            enable_news_blackout: true,
        }
    }
}

/// Parameters of the built-in feature provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeaturesConfig {
    pub or_minutes: u32,
    pub atr_window: usize,
    pub swing_lb: usize,
    pub swing_rb: usize,
    pub trend_lookback: usize,
    pub trend_bar_minutes: u32,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            or_minutes: 5,
            atr_window: 15,
            swing_lb: 2,
            swing_rb: 2,
            trend_lookback: 3,
            trend_bar_minutes: 5,
        }
    }
}

// ── Root ──

/// Root configuration object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategyConfig {
    pub instrument: String,
    pub tz: String,
    pub entry_window: EntryWindow,
    pub time_stop: TimeStopConfig,
    pub risk: RiskConfig,
    pub slippage: SlippageConfig,
    pub signals: SignalsConfig,
    pub management: ManagementConfig,
    pub filters: FiltersConfig,
    pub features: FeaturesConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            instrument: "NQ".into(),
            tz: "America/New_York".into(),
            entry_window: EntryWindow::default(),
            time_stop: TimeStopConfig::default(),
            risk: RiskConfig::default(),
            slippage: SlippageConfig::default(),
            signals: SignalsConfig::default(),
            management: ManagementConfig::default(),
            filters: FiltersConfig::default(),
            features: FeaturesConfig::default(),
        }
    }
}

impl StrategyConfig {
    /// Check cross-field invariants. Never coerces.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ew = &self.entry_window;
        if ew.start >= ew.end {
            return Err(ConfigError::EntryWindowOrder {
                start: ew.start,
                end: ew.end,
            });
        }

        let slip = &self.slippage;
        if slip.hot_start >= slip.hot_end {
            return Err(ConfigError::HotWindowOrder {
                start: slip.hot_start,
                end: slip.hot_end,
            });
        }
        positive("slippage.tick_size", slip.tick_size)?;

        let ts = &self.time_stop;
        if ts.mode == TimeStopMode::Timeout {
            nonzero("time_stop.tp1_timeout_min", ts.tp1_timeout_min as usize)?;
            nonzero("time_stop.max_holding_min", ts.max_holding_min as usize)?;
            if ts.max_holding_min < ts.tp1_timeout_min {
                return Err(ConfigError::HoldingBeforeTimeout {
                    tp1_timeout_min: ts.tp1_timeout_min,
                    max_holding_min: ts.max_holding_min,
                });
            }
        }

        let cap = self.risk.max_stop_or_mult;
        if !(cap > 0.0 && cap <= MAX_STOP_OR_MULT_LIMIT) {
            return Err(ConfigError::RiskCap(cap));
        }

        let mgmt = &self.management;
        positive("management.tp1_r", mgmt.tp1_r)?;
        positive("management.tp2_r", mgmt.tp2_r)?;
        if !(0.0..=1.0).contains(&mgmt.scale_at_tp1) {
            return Err(ConfigError::ScaleOutOfRange(mgmt.scale_at_tp1));
        }

        positive("filters.tiny_or_mult", self.filters.tiny_or_mult)?;
        let pct = self.filters.low_atr_percentile;
        if !(0.0..=100.0).contains(&pct) {
            return Err(ConfigError::PercentileOutOfRange(pct));
        }

        nonzero("signals.trigger_lookback_bars", self.signals.trigger_lookback_bars as usize)?;
        let f = &self.features;
        nonzero("features.or_minutes", f.or_minutes as usize)?;
        nonzero("features.atr_window", f.atr_window)?;
        nonzero("features.swing_lb", f.swing_lb)?;
        nonzero("features.swing_rb", f.swing_rb)?;
        nonzero("features.trend_lookback", f.trend_lookback)?;
        nonzero("features.trend_bar_minutes", f.trend_bar_minutes as usize)?;
        Ok(())
    }

    /// Canonical content hash used in run metadata.
    pub fn config_hash(&self) -> Result<ConfigHash, serde_json::Error> {
        ConfigHash::of(self)
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn nonzero(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::ZeroWindow { field })
    } else {
        Ok(())
    }
}
