//! Walk-forward scheduler.
//!
//! [`WalkForward`] steps through the market timeline one trading day at a time
//! and yields a [`DailySnapshot`] per day. While active it re-optimizes the
//! target parameter on the first day and on every last-trading-day-of-month,
//! then rebalances on those same month boundaries (or whenever nothing is
//! held). Other days only let the weights drift with prices.
//!
//! The optimizer scores a candidate by running a fresh `WalkForward` over the
//! lookback window with that candidate fixed ([`WalkForward::search`]). Inside
//! such a sub-run the parameter is flagged as enabled, which is what keeps the
//! sub-run from starting a search of its own.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, info, trace, warn};

use super::allocation::{AllocationEngine, CurrentWeights, TargetAllocation, TradeDelta};
use super::backtest::BacktestConfig;
use super::clock::SimulationClock;
use super::error::WalkForwardError;
use super::fitness::{modified_sharpe, FitnessEvaluator, FitnessMode};
use super::nav::{NavPoint, NavSeries};
use super::optimizer::{GridOptimizer, OptimizationResult};
use super::parameter::ParameterSet;
use super::portfolio::Portfolio;
use super::series::Market;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WarmingUp,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayAction {
    /// Before the start date: nothing traded or optimized.
    WarmingUp,
    /// Active, but an instrument had no usable price; no state advanced.
    Skipped,
    Rebalanced,
    Drifted,
}

/// Inclusive range of timeline indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    pub start: usize,
    pub end: usize,
}

impl LookbackWindow {
    /// The trailing `lookback_days` dates ending at `end`, clamped at index 0.
    pub fn ending_at(end: usize, lookback_days: usize) -> Self {
        Self {
            start: (end + 1).saturating_sub(lookback_days.max(1)),
            end,
        }
    }

    pub fn len(&self) -> usize {
        (self.end + 1).saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailySnapshot {
    pub index: usize,
    pub date: NaiveDate,
    pub phase: Phase,
    pub action: DayAction,
    pub nav: f64,
    pub benchmark_nav: f64,
    /// Value committed by an optimization pass run on this day.
    pub reoptimized: Option<f64>,
    pub trades: Vec<TradeDelta>,
    pub holdings: BTreeMap<String, i64>,
    pub target: TargetAllocation,
    pub weights: CurrentWeights,
}

/// What a finished run leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub nav: NavSeries,
    pub benchmark: NavSeries,
    pub params: ParameterSet,
    pub target: TargetAllocation,
    pub holdings: BTreeMap<String, i64>,
    pub active_from: Option<NaiveDate>,
    pub fitness: f64,
    pub reoptimizations: usize,
    pub rebalances: usize,
    pub skipped_days: usize,
}

impl RunSummary {
    /// NAV points from the first active day on.
    pub fn active_nav(&self) -> &[NavPoint] {
        active_slice(&self.nav, self.active_from)
    }

    pub fn active_benchmark(&self) -> &[NavPoint] {
        active_slice(&self.benchmark, self.active_from)
    }
}

fn active_slice(series: &NavSeries, from: Option<NaiveDate>) -> &[NavPoint] {
    let points = series.points();
    match from {
        Some(date) => &points[points.partition_point(|p| p.date < date)..],
        None => &[],
    }
}

pub struct WalkForward<'a> {
    market: &'a Market,
    config: &'a BacktestConfig,
    params: ParameterSet,
    evaluator: FitnessEvaluator,
    optimizer: GridOptimizer,
    clock: SimulationClock,
    /// Timeline index of the clock's first date.
    offset: usize,
    start_date: NaiveDate,
    phase: Phase,
    portfolio: Portfolio,
    engine: AllocationEngine,
    nav: NavSeries,
    benchmark: NavSeries,
    benchmark_base: Option<f64>,
    benchmark_nav: f64,
    active_from: Option<NaiveDate>,
    optimized_once: bool,
    reoptimizations: usize,
    rebalances: usize,
    skipped_days: usize,
}

impl<'a> WalkForward<'a> {
    /// Forward run over the whole timeline up to `config.end_date`.
    pub fn live(
        market: &'a Market,
        config: &'a BacktestConfig,
        params: ParameterSet,
    ) -> Result<Self, WalkForwardError> {
        let end = market.timeline.partition_point(|d| *d <= config.end_date);
        let dates = market.timeline[..end].to_vec();
        Self::build(
            market,
            config,
            params,
            dates,
            0,
            config.start_date,
            FitnessEvaluator::new(config.volatility_exponent, FitnessMode::Live),
            GridOptimizer::new(config.parallel),
        )
    }

    /// Scoring run over `window` only, active from its first date.
    pub fn search(
        market: &'a Market,
        config: &'a BacktestConfig,
        params: ParameterSet,
        window: LookbackWindow,
    ) -> Result<Self, WalkForwardError> {
        if window.is_empty() {
            return Err(WalkForwardError::Timeline {
                reason: format!("empty window {}..={}", window.start, window.end),
            });
        }
        let dates = market
            .timeline
            .get(window.start..=window.end)
            .ok_or_else(|| WalkForwardError::Timeline {
                reason: format!(
                    "window {}..={} outside timeline of {} dates",
                    window.start,
                    window.end,
                    market.timeline.len()
                ),
            })?
            .to_vec();
        let start_date = market.timeline[window.start];
        Self::build(
            market,
            config,
            params,
            dates,
            window.start,
            start_date,
            FitnessEvaluator::new(config.volatility_exponent, FitnessMode::Search),
            GridOptimizer::new(false),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        market: &'a Market,
        config: &'a BacktestConfig,
        params: ParameterSet,
        dates: Vec<NaiveDate>,
        offset: usize,
        start_date: NaiveDate,
        evaluator: FitnessEvaluator,
        optimizer: GridOptimizer,
    ) -> Result<Self, WalkForwardError> {
        let initial = TargetAllocation::from_risk_pct(
            params
                .value(&config.target_parameter)
                .ok_or_else(|| WalkForwardError::UnknownParameter {
                    name: config.target_parameter.clone(),
                })?,
        );
        Ok(Self {
            market,
            config,
            params,
            evaluator,
            optimizer,
            clock: SimulationClock::new(dates)?,
            offset,
            start_date,
            phase: Phase::WarmingUp,
            portfolio: Portfolio::new(config.initial_capital),
            engine: AllocationEngine::new(
                &config.instruments.risk,
                &config.instruments.defensive,
                initial,
            ),
            nav: NavSeries::new(),
            benchmark: NavSeries::new(),
            benchmark_base: None,
            benchmark_nav: config.initial_capital,
            active_from: None,
            optimized_once: false,
            reoptimizations: 0,
            rebalances: 0,
            skipped_days: 0,
        })
    }

    fn is_live(&self) -> bool {
        self.evaluator.mode == FitnessMode::Live
    }

    /// Runs the remaining days and finalizes the fitness.
    ///
    /// A live run is scored with the modified Sharpe ratio of its entire
    /// realized path; the live evaluator is never consulted for that.
    pub fn finish(mut self) -> RunSummary {
        while self.next().is_some() {}

        let returns = match (self.active_from, self.nav.last()) {
            (Some(from), Some(last)) => self.nav.log_returns_between(from, last.date),
            _ => Vec::new(),
        };
        let fitness = if self.is_live() {
            modified_sharpe(&returns, self.config.volatility_exponent)
        } else {
            self.evaluator.score(&returns)
        };

        RunSummary {
            holdings: self.portfolio.holdings().clone(),
            target: *self.engine.target(),
            nav: self.nav,
            benchmark: self.benchmark,
            params: self.params,
            active_from: self.active_from,
            fitness,
            reoptimizations: self.reoptimizations,
            rebalances: self.rebalances,
            skipped_days: self.skipped_days,
        }
    }

    fn reoptimize(&mut self, index: usize, date: NaiveDate) -> Option<f64> {
        let window = LookbackWindow::ending_at(index, self.config.lookback_days);
        let market = self.market;
        let config = self.config;
        let outcome = self.optimizer.optimize(
            &mut self.params,
            &config.target_parameter,
            |candidate: &ParameterSet| run_window(market, config, candidate, window),
        );
        match outcome {
            Ok(Some(outcome)) => {
                self.reoptimizations += 1;
                debug!(
                    %date,
                    window_start = %market.timeline[window.start],
                    window_days = window.len(),
                    parameter = %outcome.parameter,
                    selected = outcome.selected,
                    "re-optimized"
                );
                Some(outcome.selected)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(%date, error = %e, "optimization failed, keeping current value");
                None
            }
        }
    }

    fn rebalance(&mut self, date: NaiveDate) -> Result<Vec<TradeDelta>, WalkForwardError> {
        let pct = self
            .params
            .value(&self.config.target_parameter)
            .ok_or_else(|| WalkForwardError::UnknownParameter {
                name: self.config.target_parameter.clone(),
            })?;
        let nav = self.portfolio.net_asset_value();
        let trades = self.engine.rebalance(
            &mut self.portfolio,
            TargetAllocation::from_risk_pct(pct),
            nav,
            date,
        )?;
        self.rebalances += 1;
        if self.is_live() {
            debug!(%date, nav, risk_pct = pct, "rebalanced");
        } else {
            trace!(%date, nav, risk_pct = pct, "rebalanced");
        }
        Ok(trades)
    }

    fn mark_prices(&mut self, date: NaiveDate) {
        let market = self.market;
        for series in [&market.risk, &market.defensive] {
            if let Some(close) = series.close_on(date) {
                self.portfolio.mark(&series.code, close);
            }
        }
    }

    fn update_benchmark(&mut self, date: NaiveDate) {
        if self.phase != Phase::Active {
            return;
        }
        if let Some(close) = self.market.benchmark.close_on(date) {
            let base = *self.benchmark_base.get_or_insert(close);
            self.benchmark_nav = self.config.initial_capital * close / base;
        }
    }

    fn step_active(
        &mut self,
        index: usize,
        date: NaiveDate,
    ) -> (DayAction, Option<f64>, Vec<TradeDelta>) {
        if self.market.pair_closes(date).is_none() {
            self.skipped_days += 1;
            if self.is_live() {
                warn!(%date, "instrument data missing, skipping day");
            }
            return (DayAction::Skipped, None, Vec::new());
        }

        let boundary = self.clock.crosses_month_boundary(date);
        let mut reoptimized = None;
        if boundary || !self.optimized_once {
            self.optimized_once = true;
            reoptimized = self.reoptimize(index, date);
        }

        if boundary || !self.portfolio.has_positions() {
            match self.rebalance(date) {
                Ok(trades) => (DayAction::Rebalanced, reoptimized, trades),
                Err(e) => {
                    warn!(%date, error = %e, "rebalance failed, skipping day");
                    (DayAction::Skipped, reoptimized, Vec::new())
                }
            }
        } else {
            let nav = self.portfolio.net_asset_value();
            self.engine.adjust_for_drift(&self.portfolio, nav);
            (DayAction::Drifted, reoptimized, Vec::new())
        }
    }
}

impl Iterator for WalkForward<'_> {
    type Item = DailySnapshot;

    fn next(&mut self) -> Option<DailySnapshot> {
        let (step, date) = self.clock.advance()?;
        let index = self.offset + step;
        self.mark_prices(date);

        if self.phase == Phase::WarmingUp && date >= self.start_date {
            self.phase = Phase::Active;
            self.active_from = Some(date);
            if self.is_live() {
                info!(%date, "warm-up complete, trading active");
            }
        }

        let (action, reoptimized, trades) = match self.phase {
            Phase::WarmingUp => (DayAction::WarmingUp, None, Vec::new()),
            Phase::Active => self.step_active(index, date),
        };

        let nav = self.portfolio.net_asset_value();
        if let Err(e) = self.nav.push(date, nav) {
            warn!(%date, error = %e, "NAV point rejected");
        }
        self.update_benchmark(date);
        if let Err(e) = self.benchmark.push(date, self.benchmark_nav) {
            warn!(%date, error = %e, "benchmark point rejected");
        }

        Some(DailySnapshot {
            index,
            date,
            phase: self.phase,
            action,
            nav,
            benchmark_nav: self.benchmark_nav,
            reoptimized,
            trades,
            holdings: self.portfolio.holdings().clone(),
            target: *self.engine.target(),
            weights: self.engine.current_weights(),
        })
    }
}

/// Fitness of `params` over `window`, run in isolation from any other run.
pub fn run_window(
    market: &Market,
    config: &BacktestConfig,
    params: &ParameterSet,
    window: LookbackWindow,
) -> f64 {
    match WalkForward::search(market, config, params.clone(), window) {
        Ok(run) => run.finish().fitness,
        Err(e) => {
            warn!(error = %e, "search run could not start");
            f64::NAN
        }
    }
}

/// Scores every candidate for the lookback window ending on or before `date`,
/// leaving `params` untouched.
pub fn scan_at(
    market: &Market,
    config: &BacktestConfig,
    params: &ParameterSet,
    date: NaiveDate,
) -> Result<(LookbackWindow, Vec<OptimizationResult>), WalkForwardError> {
    let end = market
        .index_on_or_before(date)
        .ok_or_else(|| WalkForwardError::Timeline {
            reason: format!("no trading date on or before {}", date),
        })?;
    let window = LookbackWindow::ending_at(end, config.lookback_days);
    let results = GridOptimizer::new(config.parallel).scan(
        params,
        &config.target_parameter,
        |candidate: &ParameterSet| run_window(market, config, candidate, window),
    )?;
    Ok((window, results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::parameter::ParameterSpec;
    use crate::domain::series::{InstrumentSeries, Instruments};
    use approx::assert_abs_diff_eq;
    use chrono::Duration;

    fn bar(code: &str, date: NaiveDate, close: f64) -> OhlcvBar {
        OhlcvBar {
            code: code.to_string(),
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000,
        }
    }

    /// Jan 26-31 (6 days), Feb 1-21, Mar 1-21, Apr 1-12: month changes after
    /// indices 5, 26 and 47.
    fn boundary_dates() -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        for (month, first, count) in [(1, 26, 6), (2, 1, 21), (3, 1, 21), (4, 1, 12)] {
            let start = NaiveDate::from_ymd_opt(2024, month, first).unwrap();
            dates.extend((0..count).map(|i| start + Duration::days(i)));
        }
        dates
    }

    fn flat_market(dates: &[NaiveDate], risk: f64, defensive: f64) -> Market {
        let risk_bars = dates.iter().map(|&d| bar("SPY", d, risk)).collect();
        let def_bars = dates.iter().map(|&d| bar("TLT", d, defensive)).collect();
        let risk = InstrumentSeries::new("SPY".into(), risk_bars);
        Market::new(risk.clone(), InstrumentSeries::new("TLT".into(), def_bars), risk).unwrap()
    }

    fn config(start: NaiveDate, end: NaiveDate) -> BacktestConfig {
        BacktestConfig {
            instruments: Instruments {
                risk: "SPY".into(),
                defensive: "TLT".into(),
                benchmark: "SPY".into(),
            },
            start_date: start,
            end_date: end,
            initial_capital: 100_000.0,
            target_parameter: "risk_pct".into(),
            lookback_days: 10,
            volatility_exponent: 2.5,
            parallel: false,
        }
    }

    fn params(min: f64, max: f64, step: f64, value: f64) -> ParameterSet {
        ParameterSet::new(vec![ParameterSpec::new("risk_pct", min, max, step, value)])
    }

    #[test]
    fn lookback_window_clamps_at_start() {
        assert_eq!(LookbackWindow::ending_at(3, 10), LookbackWindow { start: 0, end: 3 });
        assert_eq!(LookbackWindow::ending_at(20, 10), LookbackWindow { start: 11, end: 20 });
        assert_eq!(LookbackWindow::ending_at(20, 10).len(), 10);
        assert_eq!(LookbackWindow::ending_at(5, 0).len(), 1);
        assert!(LookbackWindow { start: 5, end: 3 }.is_empty());
    }

    #[test]
    fn triggers_fire_on_first_day_and_month_ends_only() {
        let dates = boundary_dates();
        let market = flat_market(&dates, 100.0, 50.0);
        let cfg = config(dates[0], dates[dates.len() - 1]);
        let run = WalkForward::live(&market, &cfg, params(0.0, 100.0, 50.0, 60.0)).unwrap();

        let snapshots: Vec<DailySnapshot> = run.collect();
        assert_eq!(snapshots.len(), 60);

        let reoptimized: Vec<usize> = snapshots
            .iter()
            .filter(|s| s.reoptimized.is_some())
            .map(|s| s.index)
            .collect();
        let rebalanced: Vec<usize> = snapshots
            .iter()
            .filter(|s| s.action == DayAction::Rebalanced)
            .map(|s| s.index)
            .collect();
        assert_eq!(reoptimized, vec![0, 5, 26, 47]);
        assert_eq!(rebalanced, vec![0, 5, 26, 47]);
        assert!(snapshots
            .iter()
            .filter(|s| ![0, 5, 26, 47].contains(&s.index))
            .all(|s| s.action == DayAction::Drifted));
    }

    #[test]
    fn flat_sixty_forty_trades_once() {
        let dates = boundary_dates();
        let market = flat_market(&dates, 100.0, 50.0);
        let cfg = config(dates[0], dates[dates.len() - 1]);
        let run = WalkForward::live(&market, &cfg, params(60.0, 60.0, 10.0, 60.0)).unwrap();
        let snapshots: Vec<DailySnapshot> = run.collect();

        let first = &snapshots[0];
        assert_eq!(first.trades.len(), 2);
        assert_eq!(first.trades[0].delta, 600);
        assert_eq!(first.trades[1].delta, 800);
        assert!(snapshots[1..]
            .iter()
            .flat_map(|s| s.trades.iter())
            .all(|t| t.delta == 0));
        assert!(snapshots.iter().all(|s| s.holdings.get("SPY") == Some(&600)));
        for s in &snapshots {
            assert_eq!(s.target.risk_weight + s.target.defensive_weight, 1.0);
        }
    }

    #[test]
    fn warm_up_days_do_not_trade() {
        let dates = boundary_dates();
        let market = flat_market(&dates, 100.0, 50.0);
        let cfg = config(dates[10], dates[dates.len() - 1]);
        let snapshots: Vec<DailySnapshot> =
            WalkForward::live(&market, &cfg, params(60.0, 60.0, 10.0, 60.0))
                .unwrap()
                .collect();

        assert!(snapshots[..10]
            .iter()
            .all(|s| s.phase == Phase::WarmingUp && s.action == DayAction::WarmingUp));
        assert!(snapshots[..10].iter().all(|s| s.holdings.is_empty()));
        assert_eq!(snapshots[10].phase, Phase::Active);
        assert!(snapshots[10].reoptimized.is_some());
        assert_eq!(snapshots[10].action, DayAction::Rebalanced);
        assert!(snapshots[10..].iter().all(|s| s.phase == Phase::Active));
    }

    #[test]
    fn missing_data_skips_and_defers_first_optimization() {
        let dates = boundary_dates();
        let risk_bars: Vec<OhlcvBar> = dates
            .iter()
            .enumerate()
            .filter(|(i, _)| *i >= 2)
            .map(|(_, &d)| bar("SPY", d, 100.0))
            .collect();
        let def_bars = dates.iter().map(|&d| bar("TLT", d, 50.0)).collect();
        let risk = InstrumentSeries::new("SPY".into(), risk_bars);
        let market =
            Market::new(risk.clone(), InstrumentSeries::new("TLT".into(), def_bars), risk).unwrap();
        let cfg = config(dates[0], dates[dates.len() - 1]);
        let snapshots: Vec<DailySnapshot> =
            WalkForward::live(&market, &cfg, params(60.0, 60.0, 10.0, 60.0))
                .unwrap()
                .collect();

        assert_eq!(snapshots[0].action, DayAction::Skipped);
        assert_eq!(snapshots[1].action, DayAction::Skipped);
        assert!(snapshots[0].reoptimized.is_none());
        assert!(snapshots[2].reoptimized.is_some());
        assert_eq!(snapshots[2].action, DayAction::Rebalanced);
        assert_abs_diff_eq!(snapshots[0].nav, 100_000.0, epsilon = 1e-9);
    }

    #[test]
    fn skipped_boundary_is_not_made_up_later() {
        let dates = boundary_dates();
        // Defensive leg missing on the January month-end (index 5).
        let risk_bars = dates.iter().map(|&d| bar("SPY", d, 100.0)).collect();
        let def_bars = dates
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 5)
            .map(|(_, &d)| bar("TLT", d, 50.0))
            .collect();
        let risk = InstrumentSeries::new("SPY".into(), risk_bars);
        let market =
            Market::new(risk.clone(), InstrumentSeries::new("TLT".into(), def_bars), risk).unwrap();
        let cfg = config(dates[0], dates[dates.len() - 1]);
        let snapshots: Vec<DailySnapshot> =
            WalkForward::live(&market, &cfg, params(0.0, 100.0, 50.0, 60.0))
                .unwrap()
                .collect();

        let reoptimized: Vec<usize> = snapshots
            .iter()
            .filter(|s| s.reoptimized.is_some())
            .map(|s| s.index)
            .collect();
        assert_eq!(reoptimized, vec![0, 26, 47]);
        assert_eq!(snapshots[5].action, DayAction::Skipped);
        assert_eq!(snapshots[6].action, DayAction::Drifted);
    }

    #[test]
    fn optimizer_prefers_the_rising_leg() {
        // Risk leg rises steadily with a little noise, defensive leg falls.
        let dates: Vec<NaiveDate> = boundary_dates();
        let risk_bars = dates
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                let wiggle = if i % 2 == 0 { 0.3 } else { -0.3 };
                bar("SPY", d, 100.0 + i as f64 + wiggle)
            })
            .collect();
        let def_bars = dates
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                let wiggle = if i % 3 == 0 { 0.2 } else { -0.1 };
                bar("TLT", d, 100.0 - 0.5 * i as f64 + wiggle)
            })
            .collect();
        let risk = InstrumentSeries::new("SPY".into(), risk_bars);
        let market =
            Market::new(risk.clone(), InstrumentSeries::new("TLT".into(), def_bars), risk).unwrap();
        let cfg = BacktestConfig {
            volatility_exponent: 0.0,
            ..config(dates[20], dates[dates.len() - 1])
        };

        let summary = WalkForward::live(&market, &cfg, params(0.0, 100.0, 25.0, 0.0))
            .unwrap()
            .finish();
        assert_eq!(summary.params.value("risk_pct"), Some(100.0));
        assert_eq!(summary.params.enabled_count(), 0);
        assert!(summary.reoptimizations >= 1);
        assert!(summary.holdings.get("SPY").copied().unwrap_or(0) > 0);
        assert!(!summary.holdings.contains_key("TLT"));
    }

    #[test]
    fn search_run_does_not_reoptimize() {
        let dates = boundary_dates();
        let market = flat_market(&dates, 100.0, 50.0);
        let cfg = config(dates[0], dates[dates.len() - 1]);
        let mut set = params(0.0, 100.0, 50.0, 50.0);
        let scope = set.isolate("risk_pct").unwrap();
        let run = WalkForward::search(
            &market,
            &cfg,
            (*scope).clone(),
            LookbackWindow { start: 0, end: 30 },
        )
        .unwrap();
        let snapshots: Vec<DailySnapshot> = run.collect();
        assert_eq!(snapshots.len(), 31);
        assert!(snapshots.iter().all(|s| s.reoptimized.is_none()));
        assert_eq!(snapshots[0].action, DayAction::Rebalanced);
        assert_eq!(snapshots[5].action, DayAction::Rebalanced);
        assert_eq!(snapshots[26].action, DayAction::Rebalanced);
    }

    #[test]
    fn search_window_outside_timeline_is_an_error() {
        let dates = boundary_dates();
        let market = flat_market(&dates, 100.0, 50.0);
        let cfg = config(dates[0], dates[dates.len() - 1]);
        let result = WalkForward::search(
            &market,
            &cfg,
            params(0.0, 100.0, 50.0, 50.0),
            LookbackWindow { start: 50, end: 70 },
        );
        assert!(matches!(result, Err(WalkForwardError::Timeline { .. })));
        let fitness = run_window(
            &market,
            &cfg,
            &params(0.0, 100.0, 50.0, 50.0),
            LookbackWindow { start: 50, end: 70 },
        );
        assert!(fitness.is_nan());

        let inverted = WalkForward::search(
            &market,
            &cfg,
            params(0.0, 100.0, 50.0, 50.0),
            LookbackWindow { start: 10, end: 4 },
        );
        assert!(matches!(inverted, Err(WalkForwardError::Timeline { .. })));
    }

    #[test]
    fn live_fitness_uses_full_realized_path() {
        let dates = boundary_dates();
        let risk_bars = dates
            .iter()
            .enumerate()
            .map(|(i, &d)| bar("SPY", d, 100.0 + if i % 2 == 0 { 0.0 } else { 2.0 }))
            .collect();
        let def_bars = dates.iter().map(|&d| bar("TLT", d, 50.0)).collect();
        let risk = InstrumentSeries::new("SPY".into(), risk_bars);
        let market =
            Market::new(risk.clone(), InstrumentSeries::new("TLT".into(), def_bars), risk).unwrap();
        let cfg = config(dates[0], dates[dates.len() - 1]);
        let summary = WalkForward::live(&market, &cfg, params(100.0, 100.0, 10.0, 100.0))
            .unwrap()
            .finish();

        let expected = modified_sharpe(&summary.nav.log_returns(), cfg.volatility_exponent);
        assert!(summary.fitness.is_finite());
        assert_abs_diff_eq!(summary.fitness, expected, epsilon = 1e-12);
        assert_ne!(summary.fitness, 0.0);
    }

    #[test]
    fn benchmark_tracks_from_first_active_day() {
        let dates = boundary_dates();
        let risk_bars = dates
            .iter()
            .enumerate()
            .map(|(i, &d)| bar("SPY", d, if i < 5 { 100.0 } else { 200.0 }))
            .collect();
        let def_bars = dates.iter().map(|&d| bar("TLT", d, 50.0)).collect();
        let risk = InstrumentSeries::new("SPY".into(), risk_bars);
        let market =
            Market::new(risk.clone(), InstrumentSeries::new("TLT".into(), def_bars), risk).unwrap();
        let cfg = config(dates[2], dates[dates.len() - 1]);
        let snapshots: Vec<DailySnapshot> =
            WalkForward::live(&market, &cfg, params(60.0, 60.0, 10.0, 60.0))
                .unwrap()
                .collect();
        assert_abs_diff_eq!(snapshots[0].benchmark_nav, 100_000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(snapshots[2].benchmark_nav, 100_000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(snapshots[10].benchmark_nav, 200_000.0, epsilon = 1e-9);
    }

    #[test]
    fn end_date_truncates_live_run() {
        let dates = boundary_dates();
        let market = flat_market(&dates, 100.0, 50.0);
        let cfg = config(dates[0], dates[9]);
        let count = WalkForward::live(&market, &cfg, params(60.0, 60.0, 10.0, 60.0))
            .unwrap()
            .count();
        assert_eq!(count, 10);
    }

    #[test]
    fn unknown_target_parameter_is_rejected_up_front() {
        let dates = boundary_dates();
        let market = flat_market(&dates, 100.0, 50.0);
        let cfg = BacktestConfig {
            target_parameter: "missing".into(),
            ..config(dates[0], dates[9])
        };
        let result = WalkForward::live(&market, &cfg, params(60.0, 60.0, 10.0, 60.0));
        assert!(matches!(result, Err(WalkForwardError::UnknownParameter { .. })));
    }

    #[test]
    fn scan_at_reports_every_candidate() {
        let dates = boundary_dates();
        let market = flat_market(&dates, 100.0, 50.0);
        let cfg = config(dates[0], dates[dates.len() - 1]);
        let set = params(0.0, 100.0, 25.0, 50.0);
        let (window, results) = scan_at(&market, &cfg, &set, dates[30]).unwrap();
        assert_eq!(window, LookbackWindow { start: 21, end: 30 });
        assert_eq!(results.len(), 5);
        // Flat prices: zero variance everywhere, nothing finite to rank.
        assert!(results.iter().all(|r| !r.fitness.is_finite()));
        assert_eq!(set.value("risk_pct"), Some(50.0));
    }
}
