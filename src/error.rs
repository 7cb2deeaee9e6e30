/// Centralized error types for the bar pipeline
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KlineError {
    // Configuration Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    // Data Errors
    #[error("Deserialization failed: {0}")]
    DeserializationError(#[from] serde_json::Error),

    // File I/O Errors
    #[error("File I/O error: {0}")]
    FileError(#[from] std::io::Error),

    // Pipeline Errors
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Pipeline task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, KlineError>;

impl KlineError {
    /// Get error code for logging/monitoring
    pub fn error_code(&self) -> &str {
        match self {
            KlineError::ConfigError(_) => "CFG_001",
            KlineError::InvalidInterval(_) => "CFG_002",
            KlineError::DeserializationError(_) => "DATA_001",
            KlineError::FileError(_) => "FILE_001",
            KlineError::ChannelClosed(_) => "PIPE_001",
            KlineError::TaskFailed(_) => "PIPE_002",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = KlineError::InvalidInterval("0s".to_string());
        assert_eq!(err.error_code(), "CFG_002");
        assert_eq!(err.to_string(), "Invalid interval: 0s");

        let err = KlineError::ChannelClosed("bar output for AAPL".to_string());
        assert_eq!(err.error_code(), "PIPE_001");
        assert_eq!(err.to_string(), "Channel closed: bar output for AAPL");
    }
}
