// Error types for the grid backtester

use crate::config::ConfigError;

/// Unified error type returned by the engine, data layer and sweep runner.
///
/// Configuration problems are caught eagerly before the first bar is
/// processed; per-bar indicator gaps are not errors and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("Invalid grid configuration: {0}")]
    InvalidGridConfig(String),

    #[error("Invalid risk configuration: {0}")]
    InvalidRiskConfig(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid bar data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for BacktestError {
    fn from(err: csv::Error) -> Self {
        BacktestError::Csv(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BacktestError::InvalidGridConfig("grid_distance must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid grid configuration: grid_distance must be positive"
        );

        let err = BacktestError::InsufficientData("need 14 bars, got 3".to_string());
        assert!(err.to_string().contains("need 14 bars"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: BacktestError = ConfigError::Validation("max_trades must be at least 1".to_string()).into();
        assert!(matches!(err, BacktestError::Config(_)));
        assert!(err.to_string().contains("max_trades"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.csv");
        let err: BacktestError = io.into();
        assert!(matches!(err, BacktestError::Io(_)));
    }
}
