//! Error types for the GitHub access layer.
//!
//! Every fallible operation in this crate returns [`ReconError`] so call
//! sites handle each failure class explicitly instead of relying on a
//! catch-all. Zero-result responses are not errors (see
//! [`crate::network::Outcome::Empty`]).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the access layer.
#[derive(Debug, Error)]
pub enum ReconError {
    // Transport failures (below the HTTP layer)
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    /// Status 403 persisted through the cooldown retry.
    ///
    /// GitHub answers 403 both for quota exhaustion and for plain forbidden
    /// resources; no distinction is made here.
    #[error("Rate limited or access forbidden on {endpoint}")]
    RateLimited { endpoint: String },

    /// Non-retryable HTTP error, surfaced with the structured error payload
    /// the server attached to the response.
    #[error("GitHub API error: {message} (status {status_code})")]
    Api {
        message: String,
        status_code: u16,
        payload: serde_json::Value,
    },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    /// A stored record failed validation on read. Never repaired silently;
    /// the caller decides whether to re-fetch.
    #[error("Corrupt {what}: {detail}")]
    Corrupt { what: String, detail: String },
}

/// Result type alias for access-layer operations.
pub type Result<T> = std::result::Result<T, ReconError>;

// Conversion implementations for common error types

impl From<std::io::Error> for ReconError {
    fn from(err: std::io::Error) -> Self {
        ReconError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ReconError {
    fn from(err: serde_json::Error) -> Self {
        ReconError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for ReconError {
    fn from(err: rusqlite::Error) -> Self {
        ReconError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for ReconError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ReconError::Timeout(Duration::from_secs(0))
        } else {
            ReconError::Network {
                message: err.to_string(),
                cause: Some(err.to_string()),
            }
        }
    }
}

impl ReconError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ReconError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Check if this error should trigger a transport-level retry.
    ///
    /// HTTP-status outcomes (`Api`, a first 403) are governed by the page
    /// loop, not by this predicate.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconError::Network { .. } | ReconError::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReconError::RateLimited {
            endpoint: "/search/repositories".into(),
        };
        assert_eq!(
            err.to_string(),
            "Rate limited or access forbidden on /search/repositories"
        );

        let err = ReconError::Api {
            message: "Not Found".into(),
            status_code: 410,
            payload: serde_json::Value::Null,
        };
        assert!(err.to_string().contains("status 410"));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ReconError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(ReconError::Network {
            message: "connection refused".into(),
            cause: None,
        }
        .is_retryable());
        assert!(!ReconError::RateLimited {
            endpoint: "/repos/a/b".into()
        }
        .is_retryable());
        assert!(!ReconError::Corrupt {
            what: "cache record".into(),
            detail: "truncated JSON".into(),
        }
        .is_retryable());
    }
}
