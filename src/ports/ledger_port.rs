//! Execution and position ledger port.

use crate::domain::error::WalkForwardError;

/// Where share deltas are executed and positions are read back.
pub trait LedgerPort {
    /// Buys (positive `delta`) or sells (negative `delta`) at the current price.
    fn trade(&mut self, code: &str, delta: i64) -> Result<(), WalkForwardError>;

    fn current_shares(&self, code: &str) -> i64;

    fn current_price(&self, code: &str) -> Option<f64>;
}
