//! Domain error types.

/// Top-level error type for optionpilot.
#[derive(Debug, thiserror::Error)]
pub enum OptionPilotError {
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

    #[error("no market data for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("insufficient history for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientHistory {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("broker error: {reason}")]
    Broker { reason: String },

    #[error("corrupt persisted state for {key}: {reason}")]
    PersistenceCorrupt { key: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&OptionPilotError> for std::process::ExitCode {
    fn from(err: &OptionPilotError) -> Self {
        let code: u8 = match err {
            OptionPilotError::Io(_) => 1,
            OptionPilotError::ConfigParse { .. }
            | OptionPilotError::ConfigMissing { .. }
            | OptionPilotError::ConfigInvalid { .. } => 2,
            OptionPilotError::Broker { .. } => 3,
            OptionPilotError::DataUnavailable { .. }
            | OptionPilotError::InsufficientHistory { .. } => 5,
            OptionPilotError::PersistenceCorrupt { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
