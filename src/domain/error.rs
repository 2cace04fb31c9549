//! Domain error types.

/// Top-level error type for stockpicker.
///
/// Only fatal conditions live here. A month without enough data is a
/// skipped period (see [`crate::domain::backtest::SkipReason`]), not an error.
#[derive(Debug, thiserror::Error)]
pub enum StockpickerError {
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

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("structural mismatch: {reason}")]
    StructuralMismatch { reason: String },

    #[error("no data: {what}")]
    NoData { what: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StockpickerError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        StockpickerError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(section: &str, key: &str) -> Self {
        StockpickerError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    pub fn data(reason: impl Into<String>) -> Self {
        StockpickerError::Data {
            reason: reason.into(),
        }
    }
}

impl From<&StockpickerError> for std::process::ExitCode {
    fn from(err: &StockpickerError) -> Self {
        let code: u8 = match err {
            StockpickerError::Io(_) => 1,
            StockpickerError::ConfigParse { .. }
            | StockpickerError::ConfigMissing { .. }
            | StockpickerError::ConfigInvalid { .. } => 2,
            StockpickerError::Data { .. } | StockpickerError::StructuralMismatch { .. } => 3,
            StockpickerError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
