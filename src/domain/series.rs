//! Per-instrument price series, the unified timeline, and the market they form.

use crate::domain::error::WalkForwardError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

/// Instrument identifiers for one two-asset strategy variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruments {
    pub risk: String,
    pub defensive: String,
    pub benchmark: String,
}

#[derive(Debug, Clone)]
pub struct InstrumentSeries {
    pub code: String,
    pub bars: Vec<OhlcvBar>,
    date_index: HashMap<NaiveDate, usize>,
}

impl InstrumentSeries {
    pub fn new(code: String, mut bars: Vec<OhlcvBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            code,
            bars,
            date_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&OhlcvBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    /// Close on exactly `date`, if it is usable. Never looks at other dates.
    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.get_bar(date)
            .filter(|bar| bar.has_tradeable_close())
            .map(|bar| bar.close)
    }
}

pub fn build_unified_timeline(series: &[&InstrumentSeries]) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = series
        .iter()
        .flat_map(|s| s.bars.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}

/// Everything a run reads: immutable, shared by the live run and every sub-run.
#[derive(Debug, Clone)]
pub struct Market {
    pub risk: InstrumentSeries,
    pub defensive: InstrumentSeries,
    pub benchmark: InstrumentSeries,
    pub timeline: Vec<NaiveDate>,
}

impl Market {
    /// The timeline is the union of the risk and defensive dates; the benchmark
    /// is sampled on it but does not extend it.
    pub fn new(
        risk: InstrumentSeries,
        defensive: InstrumentSeries,
        benchmark: InstrumentSeries,
    ) -> Result<Self, WalkForwardError> {
        for series in [&risk, &defensive] {
            if series.bars.is_empty() {
                return Err(WalkForwardError::NoData {
                    code: series.code.clone(),
                });
            }
        }
        let timeline = build_unified_timeline(&[&risk, &defensive]);
        Ok(Self {
            risk,
            defensive,
            benchmark,
            timeline,
        })
    }

    /// Both closes for `date`, or `None` when either instrument has no usable bar.
    pub fn pair_closes(&self, date: NaiveDate) -> Option<(f64, f64)> {
        Some((self.risk.close_on(date)?, self.defensive.close_on(date)?))
    }

    /// Index of the last timeline date on or before `date`.
    pub fn index_on_or_before(&self, date: NaiveDate) -> Option<usize> {
        self.timeline.partition_point(|d| *d <= date).checked_sub(1)
    }
}
