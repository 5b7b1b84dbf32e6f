//! Job and provider error types.

use thiserror::Error;

/// Result type for queue operations.
pub type JobResult<T> = Result<T, JobError>;

/// Queue-related errors.
#[derive(Debug, Error)]
pub enum JobError {
    /// The waiting store is at capacity; the job was not created.
    #[error("Queue is full: {capacity} jobs already waiting")]
    QueueFull { capacity: usize },

    /// The queue is shutting down and no longer accepts submissions.
    #[error("Queue is shutting down")]
    ShuttingDown,

    /// A waiting job passed its deadline before it could be dispatched.
    #[error("Job {job_id} expired before dispatch")]
    Expired { job_id: String },

    /// Retry budget exhausted.
    #[error("Max retries exceeded for job {job_id}: {attempts} attempts")]
    MaxRetriesExceeded { job_id: String, attempts: u32 },

    /// The dispatcher is already running.
    #[error("Queue dispatcher already running")]
    AlreadyRunning,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl JobError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::QueueFull { .. } => "queue_full",
            JobError::ShuttingDown => "shutting_down",
            JobError::Expired { .. } => "expired",
            JobError::MaxRetriesExceeded { .. } => "max_retries_exceeded",
            JobError::AlreadyRunning => "already_running",
            JobError::Configuration(_) => "configuration",
        }
    }
}

/// Errors raised by a caption provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Provider quota or credits exhausted.
    #[error("Provider quota exhausted: {0}")]
    QuotaExhausted(String),

    /// The call did not complete within its time budget.
    #[error("Provider call timed out after {0} ms")]
    Timeout(u64),

    /// The provider answered with an error status.
    #[error("Provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Network or connection failure.
    #[error("Provider transport error: {0}")]
    Transport(String),

    /// The provider answered but the body was unusable.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Returns true if this failure signals an exhausted provider quota.
    ///
    /// Besides the dedicated variant and HTTP 429, upstream messages that
    /// mention a quota (`insufficient_quota`, "quota exceeded") are treated
    /// the same way.
    pub fn is_quota_exhausted(&self) -> bool {
        match self {
            ProviderError::QuotaExhausted(_) => true,
            ProviderError::Rejected { status: 429, .. } => true,
            ProviderError::Rejected { message, .. }
            | ProviderError::Transport(message)
            | ProviderError::InvalidResponse(message) => has_quota_signature(message),
            ProviderError::Timeout(_) => false,
        }
    }

    /// Status code reported to the metrics sink for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            ProviderError::QuotaExhausted(_) => 429,
            ProviderError::Timeout(_) => 504,
            ProviderError::Rejected { status, .. } => *status,
            ProviderError::Transport(_) | ProviderError::InvalidResponse(_) => 502,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::QuotaExhausted(_) => "quota_exhausted",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Rejected { .. } => "rejected",
            ProviderError::Transport(_) => "transport",
            ProviderError::InvalidResponse(_) => "invalid_response",
        }
    }
}

fn has_quota_signature(message: &str) -> bool {
    message.to_ascii_lowercase().contains("quota")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_display() {
        let err = JobError::QueueFull { capacity: 100 };
        assert!(err.to_string().contains("100"));
        assert_eq!(err.kind(), "queue_full");
    }

    #[test]
    fn test_expired_kind() {
        let err = JobError::Expired {
            job_id: "job-1".into(),
        };
        assert_eq!(err.kind(), "expired");
        assert!(err.to_string().contains("job-1"));
    }

    #[test]
    fn test_quota_variant_detected() {
        let err = ProviderError::QuotaExhausted("monthly credits used".into());
        assert!(err.is_quota_exhausted());
        assert_eq!(err.status_code(), 429);
    }

    #[test]
    fn test_quota_detected_from_status() {
        let err = ProviderError::Rejected {
            status: 429,
            message: "slow down".into(),
        };
        assert!(err.is_quota_exhausted());
    }

    #[test]
    fn test_quota_detected_from_message_signature() {
        let err = ProviderError::Rejected {
            status: 403,
            message: "You exceeded your current Quota".into(),
        };
        assert!(err.is_quota_exhausted());
    }

    #[test]
    fn test_quota_detected_from_insufficient_quota_code() {
        let err = ProviderError::InvalidResponse("error.code = insufficient_quota".into());
        assert!(err.is_quota_exhausted());
    }

    #[test]
    fn test_digits_429_in_message_are_not_quota() {
        let transport = ProviderError::Transport(
            "error sending request for url (http://10.0.0.7:8429/v1/captions)".into(),
        );
        assert!(!transport.is_quota_exhausted());

        let rejected = ProviderError::Rejected {
            status: 500,
            message: "internal error, request id 3f4290ab".into(),
        };
        assert!(!rejected.is_quota_exhausted());
    }

    #[test]
    fn test_timeout_is_not_quota() {
        let err = ProviderError::Timeout(30_000);
        assert!(!err.is_quota_exhausted());
        assert_eq!(err.status_code(), 504);
        assert!(err.to_string().contains("30000"));
    }

    #[test]
    fn test_error_display_max_retries() {
        let err = JobError::MaxRetriesExceeded {
            job_id: "job-xyz".into(),
            attempts: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("job-xyz") && msg.contains('4'));
    }

    #[test]
    fn test_provider_error_kinds() {
        assert_eq!(
            ProviderError::InvalidResponse("empty".into()).kind(),
            "invalid_response"
        );
        assert_eq!(ProviderError::Transport("reset".into()).status_code(), 502);
    }
}
