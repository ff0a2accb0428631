//! Historical data access port.

use crate::domain::error::WalkForwardError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `code` dated within `[start_date, end_date]`, oldest first.
    fn fetch_series(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, WalkForwardError>;
}
