//! Domain error types.

/// Top-level error type for sigtrader.
#[derive(Debug, thiserror::Error)]
pub enum SigtraderError {
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

    #[error("risk limit exceeded: {reason}")]
    RiskLimitExceeded { reason: String },

    #[error("snapshot parse error in {source_name}: {reason}")]
    SnapshotParse { source_name: String, reason: String },

    #[error("insufficient data for {timeframe}: have {bars} bars, need {minimum}")]
    InsufficientData {
        timeframe: String,
        bars: usize,
        minimum: usize,
    },

    #[error("feedback rejected: {reason}")]
    FeedbackRejected { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SigtraderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        SigtraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn risk(reason: impl Into<String>) -> Self {
        SigtraderError::RiskLimitExceeded {
            reason: reason.into(),
        }
    }
}

impl From<&SigtraderError> for std::process::ExitCode {
    fn from(err: &SigtraderError) -> Self {
        let code: u8 = match err {
            SigtraderError::Io(_) => 1,
            SigtraderError::ConfigParse { .. }
            | SigtraderError::ConfigMissing { .. }
            | SigtraderError::ConfigInvalid { .. } => 2,
            SigtraderError::SnapshotParse { .. } => 3,
            SigtraderError::InsufficientData { .. } => 5,
            SigtraderError::RiskLimitExceeded { .. } => 6,
            SigtraderError::FeedbackRejected { .. } => 7,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_invalid_message_names_section_and_key() {
        let err = SigtraderError::invalid("risk", "max_leverage", "must be >= min_leverage");
        assert_eq!(
            err.to_string(),
            "invalid config value [risk] max_leverage: must be >= min_leverage"
        );
    }

    #[test]
    fn risk_limit_message() {
        let err = SigtraderError::risk("daily loss budget exhausted");
        assert_eq!(
            err.to_string(),
            "risk limit exceeded: daily loss budget exhausted"
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SigtraderError = io.into();
        assert!(matches!(err, SigtraderError::Io(_)));
    }
}
