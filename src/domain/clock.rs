//! Simulation clock over an ordered slice of trading dates.

use crate::domain::error::WalkForwardError;
use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone)]
pub struct SimulationClock {
    dates: Vec<NaiveDate>,
    /// Index of the next date `advance` will hand out.
    cursor: usize,
}

impl SimulationClock {
    /// Dates must be strictly increasing.
    pub fn new(dates: Vec<NaiveDate>) -> Result<Self, WalkForwardError> {
        if let Some(w) = dates.windows(2).find(|w| w[1] <= w[0]) {
            return Err(WalkForwardError::Timeline {
                reason: format!("date {} does not follow {}", w[1], w[0]),
            });
        }
        Ok(Self { dates, cursor: 0 })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Moves to the next date and returns `(index, date)`.
    pub fn advance(&mut self) -> Option<(usize, NaiveDate)> {
        let date = *self.dates.get(self.cursor)?;
        let index = self.cursor;
        self.cursor += 1;
        Some((index, date))
    }

    /// The date after the one last returned by `advance`.
    pub fn peek_next(&self) -> Option<NaiveDate> {
        self.dates.get(self.cursor).copied()
    }

    /// True when the upcoming date falls in a different calendar month than `current`.
    pub fn crosses_month_boundary(&self, current: NaiveDate) -> bool {
        self.peek_next()
            .is_some_and(|next| (next.year(), next.month()) != (current.year(), current.month()))
    }
}
