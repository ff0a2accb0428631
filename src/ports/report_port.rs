//! Reporting sink port. Write-only: nothing in the simulation reads it back.

use crate::domain::allocation::TargetAllocation;
use crate::domain::error::WalkForwardError;
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub trait ReportPort {
    fn write_nav(
        &mut self,
        date: NaiveDate,
        nav: f64,
        benchmark_nav: f64,
    ) -> Result<(), WalkForwardError>;

    fn write_holdings(
        &mut self,
        date: NaiveDate,
        holdings: &BTreeMap<String, i64>,
    ) -> Result<(), WalkForwardError>;

    fn write_allocation(
        &mut self,
        date: NaiveDate,
        target: &TargetAllocation,
    ) -> Result<(), WalkForwardError>;

    /// Flushes buffered rows. Default: nothing to flush.
    fn finish(&mut self) -> Result<(), WalkForwardError> {
        Ok(())
    }
}
