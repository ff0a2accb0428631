//! Performance summary of a finished live run.

use super::nav::NavPoint;
use super::scheduler::RunSummary;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: i64,
    /// Modified Sharpe ratio of the realized path (the live fitness).
    pub fitness: f64,
    pub benchmark_return: f64,
    pub trading_days: usize,
    pub reoptimizations: usize,
    pub rebalances: usize,
    pub skipped_days: usize,
    pub final_risk_pct: f64,
}

impl Metrics {
    pub fn compute(summary: &RunSummary, initial_capital: f64) -> Self {
        let nav = summary.active_nav();
        let total_return = period_return(nav, initial_capital);

        let years = nav.len() as f64 / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return.is_finite() {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(nav);

        Metrics {
            total_return,
            annualized_return,
            max_drawdown,
            max_drawdown_duration,
            fitness: summary.fitness,
            benchmark_return: period_return(summary.active_benchmark(), initial_capital),
            trading_days: nav.len(),
            reoptimizations: summary.reoptimizations,
            rebalances: summary.rebalances,
            skipped_days: summary.skipped_days,
            final_risk_pct: summary.target.risk_weight * 100.0,
        }
    }
}

fn period_return(points: &[NavPoint], initial_capital: f64) -> f64 {
    let last = points.last().map(|p| p.value).unwrap_or(initial_capital);
    if initial_capital > 0.0 {
        (last - initial_capital) / initial_capital
    } else {
        0.0
    }
}

/// Deepest peak-to-trough fall as a fraction, and the longest run of days
/// spent below a prior peak.
fn compute_drawdown(points: &[NavPoint]) -> (f64, i64) {
    let Some(first) = points.first() else {
        return (0.0, 0);
    };

    let mut peak = first.value;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for point in points {
        if point.value >= peak {
            peak = point.value;
            current_dd_duration = 0;
        } else {
            max_dd = max_dd.max((peak - point.value) / peak);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}
