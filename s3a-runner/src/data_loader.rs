//! Minute-bar loading for the runner.
//!
//! Reads a CSV or Parquet file of OHLCV minute bars and returns the
//! regular-trading-hours slice as exchange-local [`Bar`]s:
//! 1. Column names are lower-cased; the timestamp column is the first of
//!    `ts_event`, `datetime`, `timestamp`, `time`, `date`
//! 2. Timestamps carrying an offset are converted to the exchange time zone;
//!    naive timestamps are taken as exchange-local wall clock
//! 3. Duplicate timestamps keep the last row; rows are sorted
//! 4. Optional `from`/`to` date bounds, then the RTH slice 09:30 <= t < 16:00
//! 5. Sessions without exactly 390 bars are a data-contract warning, or an
//!    error in strict mode

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use polars::prelude::*;
use s3a_core::domain::{sessions, Bar, BarError, DataHash, RTH_CLOSE, RTH_MINUTES, RTH_OPEN};
use thiserror::Error;
use tracing::{debug, warn};

/// Candidate timestamp columns, in priority order.
pub const TIMESTAMP_COLUMNS: [&str; 5] = ["ts_event", "datetime", "timestamp", "time", "date"];

const REQUIRED_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Optional per-bar news flag consumed by the session filters.
const NEWS_COLUMN: &str = "news_blackout";

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("unsupported data file extension '{0}' (expected csv or parquet)")]
    UnsupportedFormat(String),

    #[error("unknown time zone '{0}'")]
    UnknownTimeZone(String),

    #[error("no timestamp column (looked for {})", TIMESTAMP_COLUMNS.join(", "))]
    NoTimestampColumn,

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("row {row}: cannot parse timestamp {value:?}")]
    BadTimestamp { row: usize, value: String },

    #[error("row {row}: cannot parse {column} value {value:?}")]
    BadNumber {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("session {date} has {bars} RTH bars, expected 390")]
    IncompleteSession { date: NaiveDate, bars: usize },

    #[error("no bars left after RTH slicing")]
    Empty,

    #[error(transparent)]
    Bars(#[from] BarError),
}

impl From<PolarsError> for LoadError {
    fn from(e: PolarsError) -> Self {
        LoadError::Parquet(e.to_string())
    }
}

/// Options controlling how bars are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Exchange time zone (IANA name).
    pub tz: String,
    /// First session date to keep (inclusive).
    pub from: Option<NaiveDate>,
    /// Last session date to keep (inclusive).
    pub to: Option<NaiveDate>,
    /// Fail on sessions that do not have a full RTH minute grid.
    pub strict_rth: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            tz: "America/New_York".into(),
            from: None,
            to: None,
            strict_rth: false,
        }
    }
}

/// Result of loading bars, with provenance for run metadata.
#[derive(Debug)]
pub struct LoadedData {
    pub bars: Vec<Bar>,
    /// BLAKE3 over the raw file bytes.
    pub data_hash: DataHash,
    pub file_size: u64,
    /// Sessions whose RTH bar count differs from 390.
    pub incomplete_sessions: Vec<(NaiveDate, usize)>,
}

/// One parsed input row before RTH slicing.
#[derive(Debug, Clone, Copy)]
struct RawRow {
    ts: NaiveDateTime,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    news: bool,
}

/// Load a bar file, dispatching on its extension.
pub fn load_bars(path: &Path, opts: &LoadOptions) -> Result<LoadedData, LoadError> {
    let tz: Tz = opts
        .tz
        .parse()
        .map_err(|_| LoadError::UnknownTimeZone(opts.tz.clone()))?;
    let io_err = |source| LoadError::Io {
        path: path.display().to_string(),
        source,
    };
    let bytes = std::fs::read(path).map_err(io_err)?;
    let data_hash = DataHash::from_bytes(&bytes);

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let rows = match ext.as_str() {
        "csv" => read_csv(&bytes, tz)?,
        "parquet" | "pq" => read_parquet(File::open(path).map_err(io_err)?, tz)?,
        other => return Err(LoadError::UnsupportedFormat(other.to_string())),
    };
    debug!(path = %path.display(), rows = rows.len(), "parsed bar file");

    let (bars, incomplete_sessions) = finalize(rows, opts)?;
    Ok(LoadedData {
        bars,
        data_hash,
        file_size: bytes.len() as u64,
        incomplete_sessions,
    })
}

// ─── Readers ─────────────────────────────────────────────────────────

fn read_csv(bytes: &[u8], tz: Tz) -> Result<Vec<RawRow>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();
    let find = |name: &str| headers.iter().position(|h| h == name);

    let ts_col = TIMESTAMP_COLUMNS
        .iter()
        .find_map(|c| find(c))
        .ok_or(LoadError::NoTimestampColumn)?;
    let mut cols = [0usize; 5];
    for (slot, name) in cols.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = find(name).ok_or(LoadError::MissingColumn(name))?;
    }
    let news_col = find(NEWS_COLUMN);

    let mut rows = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or("");
        let raw_ts = field(ts_col);
        let ts = parse_timestamp(raw_ts, tz).ok_or_else(|| LoadError::BadTimestamp {
            row,
            value: raw_ts.to_string(),
        })?;
        let mut values = [0.0; 5];
        for ((value, &col), name) in values.iter_mut().zip(&cols).zip(REQUIRED_COLUMNS) {
            let raw = field(col);
            *value = parse_number(raw).ok_or_else(|| LoadError::BadNumber {
                row,
                column: name,
                value: raw.to_string(),
            })?;
        }
        let [open, high, low, close, volume] = values;
        rows.push(RawRow {
            ts,
            open,
            high,
            low,
            close,
            volume,
            news: news_col.is_some_and(|c| parse_flag(field(c))),
        });
    }
    Ok(rows)
}

fn read_parquet(file: File, tz: Tz) -> Result<Vec<RawRow>, LoadError> {
    let df = ParquetReader::new(file).finish()?;
    let names: Vec<(String, String)> = df
        .get_column_names()
        .iter()
        .map(|n| (n.as_str().to_ascii_lowercase(), n.as_str().to_string()))
        .collect();
    let find = |name: &str| {
        names
            .iter()
            .find(|(lower, _)| lower == name)
            .map(|(_, original)| original.as_str())
    };

    let ts_name = TIMESTAMP_COLUMNS
        .iter()
        .find_map(|c| find(c))
        .ok_or(LoadError::NoTimestampColumn)?;
    let stamps = parquet_timestamps(df.column(ts_name)?, tz)?;

    let mut values: Vec<Vec<f64>> = Vec::with_capacity(REQUIRED_COLUMNS.len());
    for name in REQUIRED_COLUMNS {
        let col = df.column(find(name).ok_or(LoadError::MissingColumn(name))?)?;
        let cast = col.cast(&DataType::Float64)?;
        let ca = cast.f64()?;
        values.push(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect());
    }
    let news: Vec<bool> = match find(NEWS_COLUMN) {
        Some(name) => {
            let cast = df.column(name)?.cast(&DataType::Boolean)?;
            cast.bool()?.into_iter().map(|v| v.unwrap_or(false)).collect()
        }
        None => vec![false; df.height()],
    };

    Ok((0..df.height())
        .map(|i| RawRow {
            ts: stamps[i],
            open: values[0][i],
            high: values[1][i],
            low: values[2][i],
            close: values[3][i],
            volume: values[4][i],
            news: news[i],
        })
        .collect())
}

/// Exchange-local timestamps from a Parquet column of any supported dtype.
fn parquet_timestamps(col: &Column, tz: Tz) -> Result<Vec<NaiveDateTime>, LoadError> {
    let bad = |row: usize, value: String| LoadError::BadTimestamp { row, value };
    match col.dtype() {
        DataType::Datetime(unit, zone) => {
            let per_second: i64 = match unit {
                TimeUnit::Nanoseconds => 1_000_000_000,
                TimeUnit::Microseconds => 1_000_000,
                TimeUnit::Milliseconds => 1_000,
            };
            let aware = zone.is_some();
            let phys = col.cast(&DataType::Int64)?;
            phys.i64()?
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    let raw = v.ok_or_else(|| bad(row, "null".into()))?;
                    let utc = from_epoch(raw, per_second).ok_or_else(|| bad(row, raw.to_string()))?;
                    // Naive Parquet datetimes store the wall clock as if it were UTC.
                    Ok(if aware {
                        utc.with_timezone(&tz).naive_local()
                    } else {
                        utc.naive_utc()
                    })
                })
                .collect()
        }
        DataType::String => col
            .str()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                let raw = v.unwrap_or("");
                parse_timestamp(raw, tz).ok_or_else(|| bad(row, raw.to_string()))
            })
            .collect(),
        _ => {
            let phys = col.cast(&DataType::Int64)?;
            phys.i64()?
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    let raw = v.ok_or_else(|| bad(row, "null".into()))?;
                    epoch_guess(raw)
                        .map(|utc| utc.with_timezone(&tz).naive_local())
                        .ok_or_else(|| bad(row, raw.to_string()))
                })
                .collect()
        }
    }
}

// ─── Field parsing ───────────────────────────────────────────────────

const AWARE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M%:z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse one timestamp cell into exchange-local wall clock.
///
/// Accepts RFC 3339, offset-suffixed and naive date-times, and integer
/// epochs (unit inferred from magnitude, interpreted as UTC).
pub fn parse_timestamp(raw: &str, tz: Tz) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        let epoch: i64 = raw.parse().ok()?;
        return epoch_guess(epoch).map(|utc| utc.with_timezone(&tz).naive_local());
    }
    // A trailing `Z` is UTC.
    let normalized = raw.strip_suffix('Z').map(|s| format!("{s}+00:00"));
    let candidate = normalized.as_deref().unwrap_or(raw);
    if let Ok(dt) = DateTime::parse_from_rfc3339(candidate) {
        return Some(dt.with_timezone(&tz).naive_local());
    }
    for fmt in AWARE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
            return Some(dt.with_timezone(&tz).naive_local());
        }
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn from_epoch(value: i64, per_second: i64) -> Option<DateTime<chrono::Utc>> {
    let secs = value.div_euclid(per_second);
    let nanos = value.rem_euclid(per_second) * (1_000_000_000 / per_second);
    DateTime::from_timestamp(secs, u32::try_from(nanos).ok()?)
}

/// Integer epoch with its unit guessed from magnitude.
fn epoch_guess(value: i64) -> Option<DateTime<chrono::Utc>> {
    let per_second = match value.unsigned_abs() {
        v if v >= 100_000_000_000_000_000 => 1_000_000_000,
        v if v >= 100_000_000_000_000 => 1_000_000,
        v if v >= 100_000_000_000 => 1_000,
        _ => 1,
    };
    from_epoch(value, per_second)
}

fn parse_number(raw: &str) -> Option<f64> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    raw.parse().ok()
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "t" | "yes" | "y")
        || raw.parse::<f64>().is_ok_and(|v| v != 0.0 && !v.is_nan())
}

// ─── Cleaning ────────────────────────────────────────────────────────

/// Sort, drop duplicates (keep last), slice dates and RTH, check sessions.
fn finalize(
    rows: Vec<RawRow>,
    opts: &LoadOptions,
) -> Result<(Vec<Bar>, Vec<(NaiveDate, usize)>), LoadError> {
    // BTreeMap insertion overwrites earlier duplicates and sorts by time.
    let mut by_time: BTreeMap<NaiveDateTime, RawRow> = BTreeMap::new();
    let n_raw = rows.len();
    for row in rows {
        by_time.insert(row.ts, row);
    }
    if by_time.len() < n_raw {
        debug!(dropped = n_raw - by_time.len(), "dropped duplicate timestamps");
    }

    let bars: Vec<Bar> = by_time
        .into_values()
        .filter(|r| {
            let d = r.ts.date();
            opts.from.map_or(true, |f| d >= f) && opts.to.map_or(true, |t| d <= t)
        })
        .filter(|r| {
            let t = r.ts.time();
            t >= RTH_OPEN && t < RTH_CLOSE
        })
        .map(|r| {
            let mut bar = Bar::new(r.ts, r.open, r.high, r.low, r.close, r.volume);
            bar.features.news_blackout = r.news;
            bar
        })
        .collect();
    if bars.is_empty() {
        return Err(LoadError::Empty);
    }

    let mut incomplete = Vec::new();
    for session in sessions(&bars)? {
        if session.len() != RTH_MINUTES {
            if opts.strict_rth {
                return Err(LoadError::IncompleteSession {
                    date: session.date,
                    bars: session.len(),
                });
            }
            warn!(date = %session.date, bars = session.len(), "incomplete RTH session");
            incomplete.push((session.date, session.len()));
        }
    }
    Ok((bars, incomplete))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn ny() -> Tz {
        chrono_tz::America::New_York
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn offset_timestamps_convert_to_exchange_time() {
        // 14:30 UTC in January is 09:30 in New York.
        let ts = parse_timestamp("2024-01-03T14:30:00Z", ny()).unwrap();
        assert_eq!(ts.time(), t(9, 30));
        let ts = parse_timestamp("2024-07-03 13:31:00+00:00", ny()).unwrap();
        assert_eq!(ts.time(), t(9, 31));
    }

    #[test]
    fn naive_timestamps_are_exchange_local() {
        let ts = parse_timestamp("2024-01-03 09:45:00", ny()).unwrap();
        assert_eq!(ts.time(), t(9, 45));
        let ts = parse_timestamp("2024-01-03 09:45", ny()).unwrap();
        assert_eq!(ts.time(), t(9, 45));
    }

    #[test]
    fn integer_epochs_infer_unit() {
        let secs = parse_timestamp("1704292200", ny()).unwrap();
        let nanos = parse_timestamp("1704292200000000000", ny()).unwrap();
        assert_eq!(secs, nanos);
        assert_eq!(secs.time(), t(9, 30));
    }

    #[test]
    fn garbage_timestamp_is_none() {
        assert!(parse_timestamp("yesterday", ny()).is_none());
        assert!(parse_timestamp("", ny()).is_none());
    }

    #[test]
    fn flags_accept_common_truthy_spellings() {
        assert!(parse_flag("1"));
        assert!(parse_flag("True"));
        assert!(parse_flag("1.0"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("false"));
    }

    #[test]
    fn empty_numbers_are_nan() {
        assert!(parse_number("").unwrap().is_nan());
        assert_eq!(parse_number("12.5"), Some(12.5));
        assert_eq!(parse_number("x"), None);
    }
}
