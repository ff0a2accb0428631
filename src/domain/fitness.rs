//! Modified Sharpe ratio used to rank candidate parameter values.

/// Which path a fitness call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitnessMode {
    /// Scoring historical windows for the grid search.
    Search,
    /// Forward simulation; scores are not needed here.
    Live,
}

/// `mean / variance^(exponent / 2)` over the given log returns.
///
/// Variance is the population variance. A zero variance yields an infinite or
/// NaN score, and an empty slice yields NaN; callers rank non-finite scores last.
pub fn modified_sharpe(returns: &[f64], volatility_exponent: f64) -> f64 {
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    mean / variance.powf(0.5 * volatility_exponent)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessEvaluator {
    pub volatility_exponent: f64,
    pub mode: FitnessMode,
}

impl FitnessEvaluator {
    pub fn new(volatility_exponent: f64, mode: FitnessMode) -> Self {
        Self {
            volatility_exponent,
            mode,
        }
    }

    pub fn score(&self, returns: &[f64]) -> f64 {
        match self.mode {
            FitnessMode::Search => modified_sharpe(returns, self.volatility_exponent),
            FitnessMode::Live => 0.0,
        }
    }
}
