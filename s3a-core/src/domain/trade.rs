//! Trade: one admitted entry resolved to its single realized exit.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SideError {
    #[error("invalid side code {0}: expected +1 or -1")]
    InvalidCode(i8),
}

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn code(self) -> i8 {
        match self {
            Side::Long => 1,
            Side::Short => -1,
        }
    }

    pub fn from_sign(code: i8) -> Result<Self, SideError> {
        match code {
            1 => Ok(Side::Long),
            -1 => Ok(Side::Short),
            other => Err(SideError::InvalidCode(other)),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Confirmation pattern that fired the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    Swingbreak,
    Engulf,
    Unknown,
}

/// Where in the VWAP envelope the signal bar closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    #[serde(rename = "vwap")]
    Vwap,
    #[serde(rename = "+1sigma")]
    PlusOneSigma,
    #[serde(rename = "-1sigma")]
    MinusOneSigma,
    #[serde(rename = "none")]
    None,
}

/// Which TP2 candidate produced the realized target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tp2Label {
    PdhPdl,
    MeasuredMove,
    RMultiple,
}

impl Tp2Label {
    /// Tie-break rank among candidates hitting on the same bar (lower wins).
    pub fn priority(self) -> u8 {
        match self {
            Tp2Label::PdhPdl => 0,
            Tp2Label::MeasuredMove => 1,
            Tp2Label::RMultiple => 2,
        }
    }
}

/// Time-stop tag recorded on every trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeStopTag {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "no_tp1_15m")]
    NoTp1,
    #[serde(rename = "max_hold")]
    MaxHold,
    #[serde(rename = "extension_break")]
    ExtensionBreak,
}

/// Reason the position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Stop,
    Tp2PdhPdl,
    Tp2MeasuredMove,
    Tp2RMultiple,
    #[serde(rename = "no_tp1_15m")]
    NoTp115m,
    MaxHold,
    ExtensionBreak,
    NoEvent,
    DegenerateRisk,
}

impl From<Tp2Label> for ExitReason {
    fn from(label: Tp2Label) -> Self {
        match label {
            Tp2Label::PdhPdl => ExitReason::Tp2PdhPdl,
            Tp2Label::MeasuredMove => ExitReason::Tp2MeasuredMove,
            Tp2Label::RMultiple => ExitReason::Tp2RMultiple,
        }
    }
}

impl ExitReason {
    /// Exit reason for a time-stop tag; `None` carries no exit.
    pub fn from_time_stop(tag: TimeStopTag) -> Option<Self> {
        match tag {
            TimeStopTag::None => None,
            TimeStopTag::NoTp1 => Some(ExitReason::NoTp115m),
            TimeStopTag::MaxHold => Some(ExitReason::MaxHold),
            TimeStopTag::ExtensionBreak => Some(ExitReason::ExtensionBreak),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::Stop => "stop",
            ExitReason::Tp2PdhPdl => "tp2_pdh_pdl",
            ExitReason::Tp2MeasuredMove => "tp2_measured_move",
            ExitReason::Tp2RMultiple => "tp2_r_multiple",
            ExitReason::NoTp115m => "no_tp1_15m",
            ExitReason::MaxHold => "max_hold",
            ExitReason::ExtensionBreak => "extension_break",
            ExitReason::NoEvent => "no_event",
            ExitReason::DegenerateRisk => "degenerate_risk",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finalized trade record. Column order is the export schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Timing ──
    pub date: NaiveDate,
    pub signal_time: NaiveDateTime,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,

    // ── Levels ──
    pub side: Side,
    pub entry: f64,
    pub stop: f64,
    pub tp1: f64,
    pub tp2: Option<f64>,
    pub tp2_label: Option<Tp2Label>,
    pub or_height: f64,
    pub sl_ticks: f64,

    // ── Outcome ──
    pub risk_r: f64,
    pub realized_r: f64,
    pub t_to_tp1_min: Option<f64>,
    pub tp1_hit: bool,

    // ── Classification ──
    pub trigger_type: TriggerType,
    pub location: Location,

    // ── Exit ──
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub time_stop: TimeStopTag,
    pub disqualifier: String,
    pub slippage_entry_ticks: u32,
    pub slippage_exit_ticks: u32,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.realized_r > 0.0
    }

    /// Minutes between fill and exit.
    pub fn holding_minutes(&self) -> i64 {
        (self.exit_time - self.entry_time).num_minutes()
    }
}
