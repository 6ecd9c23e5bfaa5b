//! Artifact export: trade tape and signal trace as CSV, trades as Parquet,
//! summaries as JSON.
//!
//! The trade CSV written here is also the input format of the Monte Carlo
//! command, so `read_trades_csv` reads back exactly what `write_trades_csv`
//! writes.

use std::fs::{self, File};
use std::path::Path;

use chrono::NaiveDateTime;
use polars::prelude::*;
use s3a_core::domain::{Bar, Trade};
use s3a_core::signals::SignalRow;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("parquet error: {0}")]
    Parquet(String),
    #[error("{bars} bars but {signals} signal rows")]
    LengthMismatch { bars: usize, signals: usize },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.display().to_string(),
        source,
    }
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Any flat serializable record list as CSV with a header row.
pub fn write_csv_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(io_error(path))?;
    Ok(())
}

/// Trade tape, one row per trade, columns in `Trade` field order.
pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<(), ExportError> {
    if trades.is_empty() {
        // No rows means no serialized header; write it explicitly.
        fs::write(path, format!("{}\n", TRADE_COLUMNS.join(","))).map_err(io_error(path))?;
        return Ok(());
    }
    write_csv_rows(path, trades)
}

/// Read a trade tape written by [`write_trades_csv`].
pub fn read_trades_csv(path: &Path) -> Result<Vec<Trade>, ExportError> {
    let mut rdr = csv::Reader::from_path(path)?;
    rdr.deserialize().map(|r| r.map_err(ExportError::from)).collect()
}

const TRADE_COLUMNS: [&str; 24] = [
    "date",
    "signal_time",
    "entry_time",
    "exit_time",
    "side",
    "entry",
    "stop",
    "tp1",
    "tp2",
    "tp2_label",
    "or_height",
    "sl_ticks",
    "risk_r",
    "realized_r",
    "t_to_tp1_min",
    "tp1_hit",
    "trigger_type",
    "location",
    "exit_price",
    "exit_reason",
    "time_stop",
    "disqualifier",
    "slippage_entry_ticks",
    "slippage_exit_ticks",
];

/// One signal-trace row: bar timestamp plus the state machine's flags.
#[derive(Debug, Serialize)]
struct SignalRecord {
    timestamp: NaiveDateTime,
    time_window_ok: bool,
    or_break_unlock: bool,
    unlocked: bool,
    direction: i8,
    disqualified: bool,
    in_zone: bool,
    zone_seen: bool,
    zone_recent: bool,
    trigger_ok: bool,
    stop_price: f64,
    riskcap_ok: bool,
}

/// Per-bar signal trace aligned with the bars.
pub fn write_signals_csv(path: &Path, bars: &[Bar], signals: &[SignalRow]) -> Result<(), ExportError> {
    if bars.len() != signals.len() {
        return Err(ExportError::LengthMismatch {
            bars: bars.len(),
            signals: signals.len(),
        });
    }
    let rows: Vec<SignalRecord> = bars
        .iter()
        .zip(signals)
        .map(|(b, s)| SignalRecord {
            timestamp: b.timestamp,
            time_window_ok: s.time_window_ok,
            or_break_unlock: s.or_break_unlock,
            unlocked: s.unlocked,
            direction: s.direction,
            disqualified: s.disqualified,
            in_zone: s.in_zone,
            zone_seen: s.zone_seen,
            zone_recent: s.zone_recent,
            trigger_ok: s.trigger_ok,
            stop_price: s.stop_price,
            riskcap_ok: s.riskcap_ok,
        })
        .collect();
    write_csv_rows(path, &rows)
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(io_error(path))
}

// ─── Parquet export ─────────────────────────────────────────────────

fn stamp(t: NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Trade list as a DataFrame. Timestamps are ISO strings, labels are their
/// wire names.
pub fn trades_to_dataframe(trades: &[Trade]) -> Result<DataFrame, ExportError> {
    let map_err = |e: PolarsError| ExportError::Parquet(format!("dataframe creation: {e}"));
    let epoch = chrono::NaiveDate::default();
    let col_f64 = |name: &str, f: fn(&Trade) -> f64| Column::new(name.into(), trades.iter().map(f).collect::<Vec<f64>>());
    let col_str = |name: &str, f: &dyn Fn(&Trade) -> String| {
        Column::new(name.into(), trades.iter().map(f).collect::<Vec<String>>())
    };

    let dates: Vec<i32> = trades.iter().map(|t| (t.date - epoch).num_days() as i32).collect();
    DataFrame::new(vec![
        Column::new("date".into(), dates).cast(&DataType::Date).map_err(map_err)?,
        col_str("signal_time", &|t| stamp(t.signal_time)),
        col_str("entry_time", &|t| stamp(t.entry_time)),
        col_str("exit_time", &|t| stamp(t.exit_time)),
        col_str("side", &|t| t.side.to_string()),
        col_f64("entry", |t| t.entry),
        col_f64("stop", |t| t.stop),
        col_f64("tp1", |t| t.tp1),
        Column::new("tp2".into(), trades.iter().map(|t| t.tp2).collect::<Vec<Option<f64>>>()),
        Column::new(
            "tp2_label".into(),
            trades
                .iter()
                .map(|t| t.tp2_label.map(|l| label(&l)))
                .collect::<Vec<Option<String>>>(),
        ),
        col_f64("or_height", |t| t.or_height),
        col_f64("sl_ticks", |t| t.sl_ticks),
        col_f64("risk_r", |t| t.risk_r),
        col_f64("realized_r", |t| t.realized_r),
        Column::new("t_to_tp1_min".into(), trades.iter().map(|t| t.t_to_tp1_min).collect::<Vec<Option<f64>>>()),
        Column::new("tp1_hit".into(), trades.iter().map(|t| t.tp1_hit).collect::<Vec<bool>>()),
        col_str("trigger_type", &|t| label(&t.trigger_type)),
        col_str("location", &|t| label(&t.location)),
        col_f64("exit_price", |t| t.exit_price),
        col_str("exit_reason", &|t| t.exit_reason.to_string()),
        col_str("time_stop", &|t| label(&t.time_stop)),
        col_str("disqualifier", &|t| t.disqualifier.clone()),
        Column::new(
            "slippage_entry_ticks".into(),
            trades.iter().map(|t| t.slippage_entry_ticks).collect::<Vec<u32>>(),
        ),
        Column::new(
            "slippage_exit_ticks".into(),
            trades.iter().map(|t| t.slippage_exit_ticks).collect::<Vec<u32>>(),
        ),
    ])
    .map_err(map_err)
}

/// Wire name of a unit enum (its serde string form).
fn label<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

pub fn write_trades_parquet(path: &Path, trades: &[Trade]) -> Result<(), ExportError> {
    let mut df = trades_to_dataframe(trades)?;
    let file = File::create(path).map_err(io_error(path))?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .map_err(|e| ExportError::Parquet(format!("write parquet: {e}")))?;
    Ok(())
}
