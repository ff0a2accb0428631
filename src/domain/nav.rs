//! Net asset value history and the log returns derived from it.

use crate::domain::error::WalkForwardError;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Append-only NAV path. Every stored value is finite and strictly positive,
/// so `ln` of any ratio is defined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavSeries {
    points: Vec<NavPoint>,
}

impl NavSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, date: NaiveDate, value: f64) -> Result<(), WalkForwardError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(WalkForwardError::NonPositiveNav { date, value });
        }
        if let Some(last) = self.points.last() {
            if date <= last.date {
                return Err(WalkForwardError::Timeline {
                    reason: format!("NAV date {} does not follow {}", date, last.date),
                });
            }
        }
        self.points.push(NavPoint { date, value });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[NavPoint] {
        &self.points
    }

    pub fn first(&self) -> Option<&NavPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&NavPoint> {
        self.points.last()
    }

    /// `ago(0)` is the most recent value, `ago(1)` the one before it.
    pub fn ago(&self, offset: usize) -> Option<f64> {
        let idx = self.points.len().checked_sub(offset + 1)?;
        Some(self.points[idx].value)
    }

    /// Daily log returns `ln(v[t] / v[t-1])`, one fewer than the number of points.
    pub fn log_returns(&self) -> Vec<f64> {
        self.points
            .windows(2)
            .map(|w| (w[1].value / w[0].value).ln())
            .collect()
    }

    /// Log returns restricted to points dated within `[start, end]`.
    pub fn log_returns_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<f64> {
        let lo = self.points.partition_point(|p| p.date < start);
        let hi = self.points.partition_point(|p| p.date <= end);
        if hi <= lo {
            return Vec::new();
        }
        self.points[lo..hi]
            .windows(2)
            .map(|w| (w[1].value / w[0].value).ln())
            .collect()
    }
}
