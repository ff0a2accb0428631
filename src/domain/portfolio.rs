//! Cash, share holdings and price marks for one simulation run.

use std::collections::{BTreeMap, HashMap};

use super::error::WalkForwardError;
use crate::ports::ledger_port::LedgerPort;

/// Simulated ledger: trades fill at the most recent mark with no costs.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    holdings: BTreeMap<String, i64>,
    marks: HashMap<String, f64>,
    trade_count: usize,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            holdings: BTreeMap::new(),
            marks: HashMap::new(),
            trade_count: 0,
        }
    }

    /// Records today's price for `code`; used for fills and valuation.
    pub fn mark(&mut self, code: &str, price: f64) {
        self.marks.insert(code.to_string(), price);
    }

    pub fn holdings(&self) -> &BTreeMap<String, i64> {
        &self.holdings
    }

    pub fn has_positions(&self) -> bool {
        !self.holdings.is_empty()
    }

    pub fn trade_count(&self) -> usize {
        self.trade_count
    }

    /// Shares times last mark; zero for an unmarked instrument.
    pub fn market_value(&self, code: &str) -> f64 {
        let shares = self.current_shares(code);
        let price = self.marks.get(code).copied().unwrap_or(0.0);
        shares as f64 * price
    }

    pub fn net_asset_value(&self) -> f64 {
        let position_value: f64 = self
            .holdings
            .keys()
            .map(|code| self.market_value(code))
            .sum();
        self.cash + position_value
    }
}

impl LedgerPort for Portfolio {
    fn trade(&mut self, code: &str, delta: i64) -> Result<(), WalkForwardError> {
        if delta == 0 {
            return Ok(());
        }
        let price = self
            .current_price(code)
            .ok_or_else(|| WalkForwardError::NoData {
                code: code.to_string(),
            })?;
        self.cash -= delta as f64 * price;
        let shares = self.holdings.entry(code.to_string()).or_insert(0);
        *shares += delta;
        if *shares == 0 {
            self.holdings.remove(code);
        }
        self.trade_count += 1;
        Ok(())
    }

    fn current_shares(&self, code: &str) -> i64 {
        self.holdings.get(code).copied().unwrap_or(0)
    }

    fn current_price(&self, code: &str) -> Option<f64> {
        self.marks.get(code).copied()
    }
}
