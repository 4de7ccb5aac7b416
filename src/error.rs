//! Mizan error types

use std::time::Duration;

/// Mizan error types
#[derive(Debug, thiserror::Error)]
pub enum MizanError {
    // Estimation service errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("empty response from estimation service")]
    EmptyResponse,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The operation ran past the deadline set in its
    /// [`ScheduleOptions`](crate::scheduler::ScheduleOptions).
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("operation panicked: {0}")]
    OperationPanicked(String),

    // Scheduler lifecycle
    #[error("scheduler is closed")]
    SchedulerClosed,

    // Collaborator errors, handled internally by the pricing and history layers
    #[error("catalog access failed: {0}")]
    CatalogAccess(String),

    #[error("persistence failed: {0}")]
    Persistence(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl MizanError {
    /// Whether this error came from (or stands in for) a call to the
    /// external estimation service.
    ///
    /// These are the only errors a scheduled request can reject with.
    pub fn is_service_error(&self) -> bool {
        matches!(
            self,
            MizanError::Http(_)
                | MizanError::Api { .. }
                | MizanError::RateLimited { .. }
                | MizanError::AuthenticationFailed
                | MizanError::EmptyResponse
                | MizanError::MalformedResponse(_)
                | MizanError::Timeout(_)
                | MizanError::OperationPanicked(_)
        )
    }

    /// Server-suggested delay before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MizanError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for MizanError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MizanError::Http(format!("request timed out: {err}"))
        } else if err.is_decode() {
            MizanError::MalformedResponse(err.to_string())
        } else {
            MizanError::Http(err.to_string())
        }
    }
}

/// Result type alias for Mizan operations
pub type Result<T> = std::result::Result<T, MizanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_are_classified() {
        assert!(MizanError::Http("boom".into()).is_service_error());
        assert!(MizanError::Timeout(Duration::from_secs(1)).is_service_error());
        assert!(
            MizanError::Api {
                status: 502,
                message: "bad gateway".into()
            }
            .is_service_error()
        );
        assert!(!MizanError::CatalogAccess("down".into()).is_service_error());
        assert!(!MizanError::Persistence("disk full".into()).is_service_error());
        assert!(!MizanError::SchedulerClosed.is_service_error());
    }

    #[test]
    fn retry_after_only_for_rate_limits() {
        let err = MizanError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(MizanError::EmptyResponse.retry_after(), None);
    }
}
