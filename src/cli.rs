//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{run_backtest, BacktestConfig};
use crate::domain::config_validation::{parse_date, validate_config, PARAMETER_SECTION_PREFIX};
use crate::domain::error::WalkForwardError;
use crate::domain::optimizer::{rank, select_best};
use crate::domain::parameter::{ParameterSet, ParameterSpec};
use crate::domain::scheduler::scan_at;
use crate::domain::series::{InstrumentSeries, Instruments, Market};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(
    name = "walkforward",
    about = "Walk-forward optimizer for a two-asset allocation strategy"
)]
pub struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the walk-forward simulation and write the report
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Report directory, overrides [report] output_dir
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Score every candidate for the lookback window ending at a date
    Grid {
        #[arg(short, long)]
        config: PathBuf,
        /// YYYY-MM-DD; the last trading day on or before it ends the window
        #[arg(short, long)]
        date: String,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.verbose, cli.quiet);
    match cli.command {
        Command::Run { config, output } => run_walkforward(&config, output.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Grid { config, date } => run_grid(&config, &date),
    }
}

pub fn log_level(verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::WARN,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

/// Installs the stderr subscriber. A second call keeps the first subscriber.
pub fn init_logging(verbose: u8, quiet: bool) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level(verbose, quiet))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Loads and validates the config, printing the first problem found.
fn load_validated(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let adapter = load_config(path)?;
    if let Err(e) = validate_config(&adapter) {
        eprintln!("error: {e}");
        return Err((&e).into());
    }
    Ok(adapter)
}

fn missing(section: &str, key: &str) -> WalkForwardError {
    WalkForwardError::ConfigMissing {
        section: section.into(),
        key: key.into(),
    }
}

fn required_date(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<NaiveDate, WalkForwardError> {
    let value = adapter
        .get_string(section, key)
        .ok_or_else(|| missing(section, key))?;
    parse_date(&value, section, key)
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, WalkForwardError> {
    let start_date = required_date(adapter, "backtest", "start_date")?;
    let end_date = required_date(adapter, "backtest", "end_date")?;

    let code = |key: &str| {
        adapter
            .get_string("backtest", key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    let risk = code("risk").ok_or_else(|| missing("backtest", "risk"))?;
    let defensive = code("defensive").ok_or_else(|| missing("backtest", "defensive"))?;
    let benchmark = code("benchmark").unwrap_or_else(|| risk.clone());

    let target_parameter = adapter
        .get_string("optimizer", "parameter")
        .map(|s| s.trim().to_lowercase())
        .ok_or_else(|| missing("optimizer", "parameter"))?;

    let lookback = adapter.get_int("optimizer", "lookback_days", 0);
    let lookback_days = usize::try_from(lookback)
        .ok()
        .filter(|&n| n >= 2)
        .ok_or_else(|| WalkForwardError::ConfigInvalid {
            section: "optimizer".into(),
            key: "lookback_days".into(),
            reason: "lookback_days must be at least 2".into(),
        })?;

    Ok(BacktestConfig {
        instruments: Instruments {
            risk,
            defensive,
            benchmark,
        },
        start_date,
        end_date,
        initial_capital: adapter.get_double("backtest", "initial_capital", 100_000.0),
        target_parameter,
        lookback_days,
        volatility_exponent: adapter.get_double("optimizer", "volatility_exponent", 2.5),
        parallel: adapter.get_bool("optimizer", "parallel", false),
    })
}

/// One [`ParameterSpec`] per `[parameter.<name>]` section, in section-name order. The
/// operating value starts at `initial`, or at `min` when that is absent.
pub fn build_parameter_set(adapter: &dyn ConfigPort) -> Result<ParameterSet, WalkForwardError> {
    let mut specs = Vec::new();
    for section in adapter.sections() {
        let Some(name) = section.strip_prefix(PARAMETER_SECTION_PREFIX) else {
            continue;
        };
        let number = |key: &str| {
            let value = adapter.get_double(&section, key, f64::NAN);
            if value.is_finite() {
                Ok(value)
            } else {
                Err(WalkForwardError::ConfigInvalid {
                    section: section.clone(),
                    key: key.into(),
                    reason: format!("{key} must be a number"),
                })
            }
        };
        let min = number("min")?;
        let max = number("max")?;
        let step = number("step")?;
        let initial = match adapter.get_string(&section, "initial") {
            Some(_) => number("initial")?,
            None => min,
        };
        specs.push(ParameterSpec::new(name, min, max, step, initial));
    }
    Ok(ParameterSet::new(specs))
}

/// Fetches all three legs from the warm-up start through the end date. The
/// benchmark is only fetched separately when it is a different instrument.
pub fn load_market(
    data_port: &dyn DataPort,
    config: &BacktestConfig,
    history_start: Option<NaiveDate>,
) -> Result<Market, WalkForwardError> {
    let from = history_start.unwrap_or(config.start_date);
    let fetch = |code: &str| -> Result<InstrumentSeries, WalkForwardError> {
        let bars = data_port.fetch_series(code, from, config.end_date)?;
        let series = InstrumentSeries::new(code.to_string(), bars);
        eprintln!("  {}: {} bars", code, series.bar_count());
        Ok(series)
    };

    let instruments = &config.instruments;
    let risk = fetch(&instruments.risk)?;
    let defensive = fetch(&instruments.defensive)?;
    let benchmark = if instruments.benchmark == instruments.risk {
        risk.clone()
    } else if instruments.benchmark == instruments.defensive {
        defensive.clone()
    } else {
        fetch(&instruments.benchmark)?
    };
    Market::new(risk, defensive, benchmark)
}

fn history_start(adapter: &dyn ConfigPort) -> Result<Option<NaiveDate>, WalkForwardError> {
    adapter
        .get_string("data", "history_start")
        .map(|s| parse_date(&s, "data", "history_start"))
        .transpose()
}

struct Prepared {
    config: BacktestConfig,
    params: ParameterSet,
    market: Market,
}

fn prepare(adapter: &dyn ConfigPort) -> Result<Prepared, WalkForwardError> {
    let config = build_backtest_config(adapter)?;
    let params = build_parameter_set(adapter)?;
    let directory = adapter
        .get_string("data", "directory")
        .ok_or_else(|| missing("data", "directory"))?;
    eprintln!("Loading price data from {}", directory);
    let data = CsvAdapter::new(PathBuf::from(directory));
    let market = load_market(&data, &config, history_start(adapter)?)?;
    Ok(Prepared {
        config,
        params,
        market,
    })
}

fn run_walkforward(config_path: &Path, output: Option<&Path>) -> ExitCode {
    let adapter = match load_validated(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let prepared = match prepare(&adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let output_dir = output.map(Path::to_path_buf).unwrap_or_else(|| {
        PathBuf::from(
            adapter
                .get_string("report", "output_dir")
                .unwrap_or_else(|| "report".to_string()),
        )
    });
    run_pipeline(&prepared.market, &prepared.config, prepared.params, &output_dir)
}

/// Runs the live simulation over `market`, writes the CSV report into
/// `output_dir` and prints a summary.
pub fn run_pipeline(
    market: &Market,
    config: &BacktestConfig,
    params: ParameterSet,
    output_dir: &Path,
) -> ExitCode {
    let mut report = match CsvReportAdapter::create(output_dir) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!(
        "Running walk-forward: {} / {}, {} to {}",
        config.instruments.risk, config.instruments.defensive, config.start_date, config.end_date,
    );
    eprintln!("  Processing: {} dates", market.timeline.len());

    let result = match run_backtest(market, config, params, &mut report) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let m = &result.metrics;

    eprintln!("\n=== Walk-Forward Results ===");
    eprintln!("Trading Days:     {}", m.trading_days);
    eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", m.annualized_return * 100.0);
    eprintln!("Benchmark Return: {:.2}%", m.benchmark_return * 100.0);
    eprintln!("Max Drawdown:     -{:.1}%", m.max_drawdown * 100.0);
    eprintln!("DD Duration:      {} days", m.max_drawdown_duration);
    eprintln!("Fitness:          {:.4}", m.fitness);
    eprintln!("Re-optimizations: {}", m.reoptimizations);
    eprintln!("Rebalances:       {}", m.rebalances);
    eprintln!("Skipped Days:     {}", m.skipped_days);
    eprintln!("Final Risk Pct:   {:.1}%", m.final_risk_pct);

    eprintln!("\nReport written to: {}", output_dir.display());
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_validated(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let built = build_backtest_config(&adapter)
        .and_then(|c| Ok((c, build_parameter_set(&adapter)?)));
    match built {
        Ok((config, params)) => {
            eprintln!("Config validated successfully");
            eprintln!(
                "  Instruments: risk {}, defensive {}, benchmark {}",
                config.instruments.risk, config.instruments.defensive, config.instruments.benchmark
            );
            for spec in params.specs() {
                eprintln!(
                    "  Parameter {}: {} candidates in [{}, {}], initial {}",
                    spec.name,
                    spec.grid().len(),
                    spec.min,
                    spec.max,
                    spec.value
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_grid(config_path: &Path, date: &str) -> ExitCode {
    let date = match parse_date(date, "cli", "date") {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let adapter = match load_validated(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let prepared = match prepare(&adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    print_grid(&prepared.market, &prepared.config, &prepared.params, date)
}

/// Prints each candidate's fitness, best first, for the window ending at `date`.
pub fn print_grid(
    market: &Market,
    config: &BacktestConfig,
    params: &ParameterSet,
    date: NaiveDate,
) -> ExitCode {
    let (window, results) = match scan_at(market, config, params, date) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!(
        "Lookback window: {} to {} ({} days)",
        market.timeline[window.start],
        market.timeline[window.end],
        window.len()
    );
    let best = select_best(&results).map(|r| r.value);
    println!("{:>12}  {:>14}", config.target_parameter, "fitness");
    for r in rank(&results) {
        let marker = if Some(r.value) == best { "  *" } else { "" };
        println!("{:>12.4}  {:>14.6}{}", r.value, r.fitness, marker);
    }
    ExitCode::SUCCESS
}
