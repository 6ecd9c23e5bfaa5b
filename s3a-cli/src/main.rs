//! S3A CLI: backtest, walk-forward and Monte Carlo commands.
//!
//! Commands:
//! - `backtest`: run the strategy over a bar file and write trades, signals and a summary
//! - `walkforward`: rolling in-sample / out-of-sample evaluation
//! - `monte-carlo`: resample a trade tape's R multiples into equity paths
//!
//! Every command writes its artifacts plus `run_meta.json` under
//! `<out-dir>/<run-id>/` and prints one compact JSON line to stdout.

mod logging;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use s3a_core::domain::DataHash;
use s3a_runner::export::{read_trades_csv, write_csv_rows, write_json, write_signals_csv, write_trades_csv, write_trades_parquet};
use s3a_runner::metrics::{grouped_summary, GroupBy, Summary};
use s3a_runner::monte_carlo::{self, MonteCarloConfig};
use s3a_runner::{load_bars, load_config, new_run_id, run_backtest, run_walk_forward, LoadOptions, RunMeta, WalkForwardConfig};
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "s3a", about = "S3A intraday backtester")]
struct Cli {
    /// Log level (overridden by RUST_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single backtest over a minute-bar file.
    Backtest {
        /// Path to a TOML strategy config.
        #[arg(long)]
        config: PathBuf,

        /// Minute bars (CSV or Parquet).
        #[arg(long)]
        data: PathBuf,

        #[arg(long, default_value = "outputs/backtest")]
        out_dir: PathBuf,

        /// Run id. Defaults to the current time as YYYYMMDD_HHMMSS.
        #[arg(long)]
        run_id: Option<String>,

        /// First session date (YYYY-MM-DD).
        #[arg(long)]
        from: Option<String>,

        /// Last session date (YYYY-MM-DD).
        #[arg(long)]
        to: Option<String>,

        /// Skip the per-bar signal trace.
        #[arg(long, default_value_t = false)]
        no_signals: bool,

        /// Skip the trade tape.
        #[arg(long, default_value_t = false)]
        no_trades: bool,

        /// Fail on sessions without a full 390-bar RTH grid.
        #[arg(long, default_value_t = false)]
        strict_rth: bool,
    },
    /// Rolling in-sample / out-of-sample walk-forward.
    Walkforward {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        data: PathBuf,

        #[arg(long, default_value = "outputs/walkforward")]
        out_dir: PathBuf,

        #[arg(long)]
        run_id: Option<String>,

        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        to: Option<String>,

        /// In-sample sessions per window.
        #[arg(long, default_value_t = 63)]
        is_days: usize,

        /// Out-of-sample sessions per window.
        #[arg(long, default_value_t = 21)]
        oos_days: usize,

        /// Sessions between window starts. Defaults to --oos-days.
        #[arg(long)]
        step: Option<usize>,

        #[arg(long, default_value_t = false)]
        strict_rth: bool,
    },
    /// Monte Carlo resampling of a trade tape written by `backtest`.
    MonteCarlo {
        #[arg(long)]
        config: PathBuf,

        /// trades.csv from a backtest run.
        #[arg(long)]
        trades: PathBuf,

        #[arg(long, default_value = "outputs/monte-carlo")]
        out_dir: PathBuf,

        #[arg(long)]
        run_id: Option<String>,

        #[arg(long, default_value_t = 1000)]
        n_paths: usize,

        /// Fraction of equity risked per trade.
        #[arg(long, default_value_t = 0.01)]
        risk_per_trade: f64,

        /// Circular block length; IID bootstrap when omitted.
        #[arg(long)]
        block_size: Option<usize>,

        /// RNG seed (required).
        #[arg(long)]
        seed: Option<u64>,

        /// Calendar span for CAGR; inferred from trade times when omitted.
        #[arg(long)]
        years: Option<f64>,

        #[arg(long, default_value_t = false)]
        keep_equity_paths: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level, cli.log_json)?;
    let argv: Vec<String> = std::env::args().collect();

    match cli.command {
        Commands::Backtest {
            config,
            data,
            out_dir,
            run_id,
            from,
            to,
            no_signals,
            no_trades,
            strict_rth,
        } => run_backtest_cmd(BacktestArgs {
            config,
            data,
            out_dir,
            run_id,
            from,
            to,
            write_signals: !no_signals,
            write_trades: !no_trades,
            strict_rth,
            argv,
        }),
        Commands::Walkforward {
            config,
            data,
            out_dir,
            run_id,
            from,
            to,
            is_days,
            oos_days,
            step,
            strict_rth,
        } => run_walkforward_cmd(
            WindowedArgs {
                config,
                data,
                out_dir,
                run_id,
                from,
                to,
                strict_rth,
                argv,
            },
            WalkForwardConfig {
                is_days,
                oos_days,
                step,
            },
        ),
        Commands::MonteCarlo {
            config,
            trades,
            out_dir,
            run_id,
            n_paths,
            risk_per_trade,
            block_size,
            seed,
            years,
            keep_equity_paths,
        } => {
            if seed.is_none() {
                bail!("--seed is required for a reproducible Monte Carlo run");
            }
            run_monte_carlo_cmd(
                config,
                trades,
                out_dir,
                run_id,
                MonteCarloConfig {
                    n_paths,
                    risk_per_trade,
                    block_size,
                    seed,
                    years,
                    keep_equity_paths,
                },
                argv,
            )
        }
    }
}

struct BacktestArgs {
    config: PathBuf,
    data: PathBuf,
    out_dir: PathBuf,
    run_id: Option<String>,
    from: Option<String>,
    to: Option<String>,
    write_signals: bool,
    write_trades: bool,
    strict_rth: bool,
    argv: Vec<String>,
}

struct WindowedArgs {
    config: PathBuf,
    data: PathBuf,
    out_dir: PathBuf,
    run_id: Option<String>,
    from: Option<String>,
    to: Option<String>,
    strict_rth: bool,
    argv: Vec<String>,
}

fn parse_date(raw: Option<&str>, flag: &str) -> Result<Option<NaiveDate>> {
    raw.map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("{flag} expects YYYY-MM-DD, got {s:?}")))
        .transpose()
}

/// `<out_dir>/<run_id>`, created.
fn run_dir(out_dir: &Path, run_id: &str) -> Result<PathBuf> {
    let root = out_dir.join(run_id);
    fs::create_dir_all(&root).with_context(|| format!("cannot create {}", root.display()))?;
    Ok(root)
}

/// One compact JSON line: run id, artifact directory, then the summary fields.
fn print_result<T: Serialize>(run_id: &str, root: &Path, summary: &T) -> Result<()> {
    let mut line = serde_json::Map::new();
    line.insert("run_id".into(), run_id.into());
    line.insert("artifacts_dir".into(), root.display().to_string().into());
    if let serde_json::Value::Object(fields) = serde_json::to_value(summary)? {
        line.extend(fields);
    }
    println!("{}", serde_json::Value::Object(line));
    Ok(())
}

fn run_backtest_cmd(args: BacktestArgs) -> Result<()> {
    let (cfg, _) = load_config(&args.config)?;
    let from = parse_date(args.from.as_deref(), "--from")?;
    let to = parse_date(args.to.as_deref(), "--to")?;
    let opts = LoadOptions {
        tz: cfg.tz.clone(),
        from,
        to,
        strict_rth: args.strict_rth,
    };
    let loaded = load_bars(&args.data, &opts)?;
    let incomplete = loaded.incomplete_sessions.len();
    let result = run_backtest(loaded.bars, &cfg)?;

    let run_id = args.run_id.unwrap_or_else(new_run_id);
    let root = run_dir(&args.out_dir, &run_id)?;
    let mut meta = RunMeta::new("backtest", &run_id, args.argv, &root)
        .with_config(&args.config, &cfg)?
        .with_data(&args.data, loaded.file_size, loaded.data_hash);

    let summary_path = root.join("summary.json");
    write_json(&summary_path, &result.summary)?;
    meta.artifact(&summary_path);

    let grouped: std::collections::BTreeMap<&str, _> = GroupBy::ALL
        .iter()
        .map(|&g| (g.name(), grouped_summary(&result.trades, g)))
        .collect();
    let grouped_path = root.join("grouped_summary.json");
    write_json(&grouped_path, &grouped)?;
    meta.artifact(&grouped_path);

    if args.write_signals {
        let path = root.join("signals.csv");
        write_signals_csv(&path, &result.bars, &result.signals)?;
        meta.artifact(&path);
    }
    if args.write_trades {
        let csv_path = root.join("trades.csv");
        write_trades_csv(&csv_path, &result.trades)?;
        meta.artifact(&csv_path);
        let parquet_path = root.join("trades.parquet");
        write_trades_parquet(&parquet_path, &result.trades)?;
        meta.artifact(&parquet_path);
    }

    meta.param("date_from", from);
    meta.param("date_to", to);
    meta.param("strict_rth", args.strict_rth);
    meta.param("incomplete_sessions", incomplete);
    meta.param("write_signals", args.write_signals);
    meta.param("write_trades", args.write_trades);
    meta.write(&root)?;
    info!(run_id = %run_id, dir = %root.display(), "artifacts written");

    print_result(&run_id, &root, &result.summary)
}

fn run_walkforward_cmd(args: WindowedArgs, wf: WalkForwardConfig) -> Result<()> {
    let (cfg, _) = load_config(&args.config)?;
    let from = parse_date(args.from.as_deref(), "--from")?;
    let to = parse_date(args.to.as_deref(), "--to")?;
    let opts = LoadOptions {
        tz: cfg.tz.clone(),
        from,
        to,
        strict_rth: args.strict_rth,
    };
    let loaded = load_bars(&args.data, &opts)?;
    let result = run_walk_forward(loaded.bars, &cfg, &wf)?;

    let run_id = args.run_id.unwrap_or_else(new_run_id);
    let root = run_dir(&args.out_dir, &run_id)?;
    let mut meta = RunMeta::new("walkforward", &run_id, args.argv, &root)
        .with_config(&args.config, &cfg)?
        .with_data(&args.data, loaded.file_size, loaded.data_hash);

    let windows_path = root.join("windows.json");
    write_json(&windows_path, &result.windows)?;
    meta.artifact(&windows_path);

    let equity_path = root.join("wf_equity.csv");
    write_csv_rows(&equity_path, &result.oos_equity)?;
    meta.artifact(&equity_path);

    let is_trades: Vec<_> = result.is_trades.iter().map(|t| t.trade.clone()).collect();
    let oos_trades: Vec<_> = result.oos_trades.iter().map(|t| t.trade.clone()).collect();
    for (name, trades) in [("is_trades.csv", &is_trades), ("oos_trades.csv", &oos_trades)] {
        let path = root.join(name);
        write_trades_csv(&path, trades)?;
        meta.artifact(&path);
    }

    meta.param("date_from", from);
    meta.param("date_to", to);
    meta.param("is_days", wf.is_days);
    meta.param("oos_days", wf.oos_days);
    meta.param("step", wf.step.unwrap_or(wf.oos_days));
    meta.write(&root)?;

    #[derive(Serialize)]
    struct WalkForwardLine {
        windows: usize,
        #[serde(flatten)]
        oos: Summary,
    }
    print_result(
        &run_id,
        &root,
        &WalkForwardLine {
            windows: result.windows.len(),
            oos: Summary::compute(&oos_trades),
        },
    )
}

#[derive(Serialize)]
struct EquityRow {
    path_id: usize,
    step: usize,
    equity: f64,
}

fn run_monte_carlo_cmd(
    config_path: PathBuf,
    trades_path: PathBuf,
    out_dir: PathBuf,
    run_id: Option<String>,
    mc: MonteCarloConfig,
    argv: Vec<String>,
) -> Result<()> {
    let (cfg, _) = load_config(&config_path)?;
    let trades = read_trades_csv(&trades_path)?;
    let bytes = fs::read(&trades_path).with_context(|| format!("cannot read {}", trades_path.display()))?;
    let result = monte_carlo::simulate(&trades, &mc)?;

    let run_id = run_id.unwrap_or_else(new_run_id);
    let root = run_dir(&out_dir, &run_id)?;
    let mut meta = RunMeta::new("monte-carlo", &run_id, argv, &root)
        .with_config(&config_path, &cfg)?
        .with_data(&trades_path, bytes.len() as u64, DataHash::from_bytes(&bytes))
        .with_seed(mc.seed);

    let summary_path = root.join("summary.json");
    write_json(&summary_path, &result.summary)?;
    meta.artifact(&summary_path);

    let samples_path = root.join("mc_samples.csv");
    write_csv_rows(&samples_path, &result.samples)?;
    meta.artifact(&samples_path);

    if let Some(paths) = &result.equity_paths {
        let rows: Vec<EquityRow> = paths
            .iter()
            .enumerate()
            .flat_map(|(path_id, eq)| {
                eq.iter().enumerate().map(move |(step, &equity)| EquityRow { path_id, step, equity })
            })
            .collect();
        let path = root.join("mc_equity_paths.csv");
        write_csv_rows(&path, &rows)?;
        meta.artifact(&path);
    }

    meta.param("n_paths", mc.n_paths);
    meta.param("risk_per_trade", mc.risk_per_trade);
    meta.param("block_size", mc.block_size);
    meta.param("years", mc.years);
    meta.param("keep_equity_paths", mc.keep_equity_paths);
    meta.write(&root)?;

    print_result(&run_id, &root, &result.summary)
}
