//! Daily OHLCV bar as delivered by the data port.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub code: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    /// A close is tradeable when it can be used as a fill and valuation price.
    pub fn has_tradeable_close(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}
