//! Configuration validation.
//!
//! Checks every field a run depends on before any data is loaded.

use crate::domain::error::WalkForwardError;
use crate::domain::parameter::{MAX_GRID_POINTS, ParameterSpec};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const PARAMETER_SECTION_PREFIX: &str = "parameter.";

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), WalkForwardError> {
    validate_data(config)?;
    validate_initial_capital(config)?;
    validate_dates(config)?;
    validate_instruments(config)?;
    validate_optimizer(config)?;
    validate_parameters(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> WalkForwardError {
    WalkForwardError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, WalkForwardError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(WalkForwardError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn validate_data(config: &dyn ConfigPort) -> Result<(), WalkForwardError> {
    required(config, "data", "directory")?;
    if let Some(s) = config.get_string("data", "history_start") {
        parse_date(&s, "data", "history_start")?;
    }
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), WalkForwardError> {
    let value = config.get_double("backtest", "initial_capital", 0.0);
    if value <= 0.0 || !value.is_finite() {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), WalkForwardError> {
    let start_date = parse_date(
        &required(config, "backtest", "start_date")?,
        "backtest",
        "start_date",
    )?;
    let end_date = parse_date(
        &required(config, "backtest", "end_date")?,
        "backtest",
        "end_date",
    )?;

    if start_date >= end_date {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    if let Some(s) = config.get_string("data", "history_start") {
        if parse_date(&s, "data", "history_start")? > start_date {
            return Err(invalid(
                "data",
                "history_start",
                "history_start must not be after start_date",
            ));
        }
    }
    Ok(())
}

pub fn parse_date(value: &str, section: &str, key: &str) -> Result<NaiveDate, WalkForwardError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| invalid(section, key, format!("invalid {key} format, expected YYYY-MM-DD")))
}

fn validate_instruments(config: &dyn ConfigPort) -> Result<(), WalkForwardError> {
    let risk = required(config, "backtest", "risk")?;
    let defensive = required(config, "backtest", "defensive")?;
    if risk.eq_ignore_ascii_case(&defensive) {
        return Err(invalid(
            "backtest",
            "defensive",
            "risk and defensive instruments must differ",
        ));
    }
    Ok(())
}

fn validate_optimizer(config: &dyn ConfigPort) -> Result<(), WalkForwardError> {
    required(config, "optimizer", "parameter")?;

    let lookback = config.get_int("optimizer", "lookback_days", 0);
    if lookback < 2 {
        return Err(invalid(
            "optimizer",
            "lookback_days",
            "lookback_days must be at least 2",
        ));
    }

    let exponent = config.get_double("optimizer", "volatility_exponent", 2.5);
    if !exponent.is_finite() || exponent < 0.0 {
        return Err(invalid(
            "optimizer",
            "volatility_exponent",
            "volatility_exponent must be a non-negative number",
        ));
    }
    Ok(())
}

fn validate_parameters(config: &dyn ConfigPort) -> Result<(), WalkForwardError> {
    let target = required(config, "optimizer", "parameter")?.to_lowercase();
    let target_section = format!("{PARAMETER_SECTION_PREFIX}{target}");
    if !config.sections().contains(&target_section) {
        return Err(WalkForwardError::ConfigMissing {
            section: target_section,
            key: "min".to_string(),
        });
    }

    for section in config
        .sections()
        .into_iter()
        .filter(|s| s.starts_with(PARAMETER_SECTION_PREFIX))
    {
        for key in ["min", "max", "step"] {
            required(config, &section, key)?;
        }
        let min = config.get_double(&section, "min", f64::NAN);
        let max = config.get_double(&section, "max", f64::NAN);
        let step = config.get_double(&section, "step", f64::NAN);
        if !min.is_finite() || !max.is_finite() {
            return Err(invalid(&section, "min", "min and max must be numbers"));
        }
        if !(step > 0.0 && step.is_finite()) {
            return Err(invalid(&section, "step", "step must be positive"));
        }
        if min > max {
            return Err(invalid(&section, "min", "min must not exceed max"));
        }
        let spec = ParameterSpec::new(section.as_str(), min, max, step, min);
        if spec.candidate_count().is_none() {
            return Err(invalid(
                &section,
                "step",
                format!("grid exceeds {MAX_GRID_POINTS} candidates"),
            ));
        }
    }
    Ok(())
}
