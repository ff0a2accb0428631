//! Backtest configuration and the live walk-forward driver.

use chrono::NaiveDate;
use tracing::info;

use super::error::WalkForwardError;
use super::metrics::Metrics;
use super::parameter::ParameterSet;
use super::scheduler::{Phase, RunSummary, WalkForward};
use super::series::{Instruments, Market};
use crate::ports::report_port::ReportPort;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub instruments: Instruments,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    /// Parameter whose value, in percent, is the risk-instrument weight.
    pub target_parameter: String,
    /// Trading days in each re-optimization window, current day included.
    pub lookback_days: usize,
    pub volatility_exponent: f64,
    pub parallel: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub summary: RunSummary,
    pub metrics: Metrics,
}

/// Runs the live simulation to completion.
///
/// Every day's NAV goes to `report`; holdings and the target allocation are
/// written for active days only.
pub fn run_backtest(
    market: &Market,
    config: &BacktestConfig,
    params: ParameterSet,
    report: &mut dyn ReportPort,
) -> Result<BacktestResult, WalkForwardError> {
    let mut run = WalkForward::live(market, config, params)?;
    info!(
        risk = %config.instruments.risk,
        defensive = %config.instruments.defensive,
        start = %config.start_date,
        end = %config.end_date,
        lookback_days = config.lookback_days,
        "starting walk-forward run"
    );

    for snapshot in run.by_ref() {
        report.write_nav(snapshot.date, snapshot.nav, snapshot.benchmark_nav)?;
        if snapshot.phase == Phase::Active {
            report.write_holdings(snapshot.date, &snapshot.holdings)?;
            report.write_allocation(snapshot.date, &snapshot.target)?;
        }
    }
    report.finish()?;

    let summary = run.finish();
    let metrics = Metrics::compute(&summary, config.initial_capital);
    info!(
        total_return = metrics.total_return,
        fitness = metrics.fitness,
        reoptimizations = metrics.reoptimizations,
        "walk-forward run complete"
    );
    Ok(BacktestResult { summary, metrics })
}
