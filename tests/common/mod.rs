#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use walkforward::domain::allocation::TargetAllocation;
use walkforward::domain::backtest::BacktestConfig;
use walkforward::domain::error::WalkForwardError;
pub use walkforward::domain::ohlcv::OhlcvBar;
use walkforward::domain::series::Instruments;
use walkforward::ports::data_port::DataPort;
use walkforward::ports::report_port::ReportPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_series(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, WalkForwardError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(WalkForwardError::DataAccess {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(code)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Report sink that keeps every row in memory.
#[derive(Debug, Default)]
pub struct RecordingReport {
    pub nav: Vec<(NaiveDate, f64, f64)>,
    pub holdings: Vec<(NaiveDate, BTreeMap<String, i64>)>,
    pub allocations: Vec<(NaiveDate, TargetAllocation)>,
    pub finished: bool,
}

impl ReportPort for RecordingReport {
    fn write_nav(
        &mut self,
        date: NaiveDate,
        nav: f64,
        benchmark_nav: f64,
    ) -> Result<(), WalkForwardError> {
        self.nav.push((date, nav, benchmark_nav));
        Ok(())
    }

    fn write_holdings(
        &mut self,
        date: NaiveDate,
        holdings: &BTreeMap<String, i64>,
    ) -> Result<(), WalkForwardError> {
        self.holdings.push((date, holdings.clone()));
        Ok(())
    }

    fn write_allocation(
        &mut self,
        date: NaiveDate,
        target: &TargetAllocation,
    ) -> Result<(), WalkForwardError> {
        self.allocations.push((date, *target));
        Ok(())
    }

    fn finish(&mut self) -> Result<(), WalkForwardError> {
        self.finished = true;
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(code: &str, date: NaiveDate, close: f64) -> OhlcvBar {
    OhlcvBar {
        code: code.to_string(),
        date,
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1000,
    }
}

/// Jan 26-31, Feb 1-21, Mar 1-21, Apr 1-12 of 2024: 60 dates whose month
/// changes follow indices 5, 26 and 47.
pub fn boundary_dates() -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    for (month, first, count) in [(1, 26, 6), (2, 1, 21), (3, 1, 21), (4, 1, 12)] {
        let start = date(2024, month, first);
        dates.extend((0..count).map(|i| start + Duration::days(i)));
    }
    dates
}

/// One bar per date with `close_at(index)` as the close.
pub fn bars_on(
    code: &str,
    dates: &[NaiveDate],
    close_at: impl Fn(usize) -> f64,
) -> Vec<OhlcvBar> {
    dates
        .iter()
        .enumerate()
        .map(|(i, &d)| make_bar(code, d, close_at(i)))
        .collect()
}

/// Consecutive calendar days from `start`, drifting `step` per day.
pub fn generate_bars(
    code: &str,
    start: NaiveDate,
    count: usize,
    start_price: f64,
    step: f64,
) -> Vec<OhlcvBar> {
    (0..count)
        .map(|i| {
            make_bar(
                code,
                start + Duration::days(i as i64),
                start_price + step * i as f64,
            )
        })
        .collect()
}

pub fn sample_config(start_date: NaiveDate, end_date: NaiveDate) -> BacktestConfig {
    BacktestConfig {
        instruments: Instruments {
            risk: "SPY".into(),
            defensive: "TLT".into(),
            benchmark: "SPY".into(),
        },
        start_date,
        end_date,
        initial_capital: 100_000.0,
        target_parameter: "risk_pct".into(),
        lookback_days: 10,
        volatility_exponent: 2.5,
        parallel: false,
    }
}
