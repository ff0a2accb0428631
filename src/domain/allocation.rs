//! Two-instrument target weights and the share trades that realize them.

use chrono::NaiveDate;

use super::error::WalkForwardError;
use crate::ports::ledger_port::LedgerPort;

/// Risk/defensive split. `defensive_weight` is always `1.0 - risk_weight`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetAllocation {
    pub risk_weight: f64,
    pub defensive_weight: f64,
    pub updated: Option<NaiveDate>,
}

impl TargetAllocation {
    /// Clamps into `[0, 1]`; NaN becomes an all-defensive split.
    pub fn from_risk_weight(weight: f64) -> Self {
        let risk_weight = if weight.is_nan() {
            0.0
        } else {
            weight.clamp(0.0, 1.0)
        };
        Self {
            risk_weight,
            defensive_weight: 1.0 - risk_weight,
            updated: None,
        }
    }

    /// Weight given as a percentage of NAV in the risk instrument.
    pub fn from_risk_pct(pct: f64) -> Self {
        Self::from_risk_weight(pct / 100.0)
    }
}

/// Market-value weights of the current holdings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CurrentWeights {
    pub risk: f64,
    pub defensive: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeDelta {
    pub code: String,
    pub target_shares: i64,
    pub delta: i64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationEngine {
    risk_code: String,
    defensive_code: String,
    target: TargetAllocation,
    current: CurrentWeights,
}

impl AllocationEngine {
    pub fn new(risk_code: &str, defensive_code: &str, initial: TargetAllocation) -> Self {
        Self {
            risk_code: risk_code.to_string(),
            defensive_code: defensive_code.to_string(),
            target: initial,
            current: CurrentWeights::default(),
        }
    }

    pub fn target(&self) -> &TargetAllocation {
        &self.target
    }

    pub fn current_weights(&self) -> CurrentWeights {
        self.current
    }

    /// Trades both legs to `floor(nav * weight / price)` shares.
    ///
    /// The recorded target is replaced even when both deltas are zero, and kept
    /// when either price is missing. The cash left over by flooring is not
    /// redistributed.
    pub fn rebalance<L: LedgerPort>(
        &mut self,
        ledger: &mut L,
        target: TargetAllocation,
        nav: f64,
        date: NaiveDate,
    ) -> Result<Vec<TradeDelta>, WalkForwardError> {
        let legs = [
            (self.risk_code.as_str(), target.risk_weight),
            (self.defensive_code.as_str(), target.defensive_weight),
        ];
        let mut deltas = Vec::with_capacity(legs.len());
        for (code, weight) in legs {
            let price = ledger
                .current_price(code)
                .ok_or_else(|| WalkForwardError::NoData {
                    code: code.to_string(),
                })?;
            let target_shares = (nav * weight / price).floor() as i64;
            deltas.push(TradeDelta {
                code: code.to_string(),
                target_shares,
                delta: target_shares - ledger.current_shares(code),
                price,
            });
        }

        self.target = TargetAllocation {
            updated: Some(date),
            ..target
        };

        for trade in deltas.iter().filter(|t| t.delta != 0) {
            ledger.trade(&trade.code, trade.delta)?;
        }

        self.current = self.weights_of(ledger, nav);
        Ok(deltas)
    }

    /// No trades: lets the recorded weights float with prices.
    pub fn adjust_for_drift<L: LedgerPort>(&mut self, ledger: &L, nav: f64) -> CurrentWeights {
        self.current = self.weights_of(ledger, nav);
        self.current
    }

    fn weights_of<L: LedgerPort>(&self, ledger: &L, nav: f64) -> CurrentWeights {
        if nav <= 0.0 {
            return CurrentWeights::default();
        }
        let value = |code: &str| {
            ledger.current_shares(code) as f64 * ledger.current_price(code).unwrap_or(0.0)
        };
        CurrentWeights {
            risk: value(&self.risk_code) / nav,
            defensive: value(&self.defensive_code) / nav,
        }
    }
}
