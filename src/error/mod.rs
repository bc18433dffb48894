//! Error types for the CreoleCentric client and webhook receiver.

use thiserror::Error;

/// Primary error type for all client and receiver operations.
#[derive(Error, Debug)]
pub enum CreoleError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Service error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// A single request exceeded its deadline.
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// A job was still running when `wait_for_job` gave up.
    #[error("Job {job_id} did not finish within {timeout_ms}ms")]
    PollTimeout { job_id: String, timeout_ms: u64 },

    #[error("Malformed webhook: {0}")]
    MalformedWebhook(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    Webhook,
    Io,
}

impl CreoleError {
    /// Create a service error from a non-2xx response.
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited(_) => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) | Self::PollTimeout { .. } => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::MalformedWebhook(_) => ErrorCategory::Webhook,
            Self::Io(_) => ErrorCategory::Io,
            Self::Api { status, .. } => match status {
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
        }
    }

    /// Whether this error is potentially retryable.
    ///
    /// [`CreoleError::PollTimeout`] is never retryable.
    pub fn is_retryable(&self) -> bool {
        if matches!(self, Self::PollTimeout { .. }) {
            return false;
        }
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// HTTP status code carried by this error, if it came from the service.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Authentication(_) => Some(401),
            Self::RateLimited(_) => Some(429),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CreoleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_timeouts_are_retryable() {
        assert!(CreoleError::api(503, "unavailable").is_retryable());
        assert!(CreoleError::Timeout(30_000).is_retryable());
        assert!(!CreoleError::api(404, "missing").is_retryable());
        assert!(!CreoleError::Validation("empty".into()).is_retryable());
    }

    #[test]
    fn poll_timeout_is_distinct_from_request_timeout() {
        let err = CreoleError::PollTimeout {
            job_id: "job-1".into(),
            timeout_ms: 300,
        };
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Job job-1 did not finish within 300ms");
        assert_eq!(CreoleError::Timeout(300).to_string(), "Timeout after 300ms");
    }
}
