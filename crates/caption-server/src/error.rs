//! Server error type.

use caption_jobs::JobError;
use thiserror::Error;

/// Result alias for server startup and configuration.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Queue construction or startup failed.
    #[error("Queue error: {0}")]
    Queue(#[from] JobError),

    /// Prometheus exporter could not be installed.
    #[error("Metrics exporter error: {0}")]
    Metrics(String),
}

impl From<config::ConfigError> for ServerError {
    fn from(err: config::ConfigError) -> Self {
        ServerError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_error_converts() {
        let err: ServerError = JobError::AlreadyRunning.into();
        assert!(matches!(err, ServerError::Queue(JobError::AlreadyRunning)));
        assert!(err.to_string().starts_with("Queue error"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: ServerError = config::ConfigError::Message("bad key".into()).into();
        assert_eq!(err.to_string(), "Configuration error: bad key");
    }
}
