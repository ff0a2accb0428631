//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for walkforward.
#[derive(Debug, thiserror::Error)]
pub enum WalkForwardError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data access error: {reason}")]
    DataAccess { reason: String },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error("invalid timeline: {reason}")]
    Timeline { reason: String },

    #[error("unknown parameter {name}")]
    UnknownParameter { name: String },

    #[error("net asset value {value} on {date} must be finite and positive")]
    NonPositiveNav { date: NaiveDate, value: f64 },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&WalkForwardError> for std::process::ExitCode {
    fn from(err: &WalkForwardError) -> Self {
        let code: u8 = match err {
            WalkForwardError::Io(_) | WalkForwardError::Report { .. } => 1,
            WalkForwardError::ConfigParse { .. }
            | WalkForwardError::ConfigMissing { .. }
            | WalkForwardError::ConfigInvalid { .. } => 2,
            WalkForwardError::DataAccess { .. } => 3,
            WalkForwardError::NoData { .. } => 5,
            WalkForwardError::Timeline { .. }
            | WalkForwardError::UnknownParameter { .. }
            | WalkForwardError::NonPositiveNav { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
