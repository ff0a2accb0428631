//! Core domain types and simulation logic.

pub mod allocation;
pub mod backtest;
pub mod clock;
pub mod config_validation;
pub mod error;
pub mod fitness;
pub mod metrics;
pub mod nav;
pub mod ohlcv;
pub mod optimizer;
pub mod parameter;
pub mod portfolio;
pub mod scheduler;
pub mod series;
