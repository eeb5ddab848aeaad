//! Error types for the document repository.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::DocumentId;

/// Result type alias using the repository's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for document repository operations.
///
/// Every failure coming back from a [`DocumentApi`](crate::DocumentApi) call
/// is expressed as one of these variants. The type is `Clone` so that failed
/// operations can be parked in the retry queue together with their cause.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The server rejected the payload. `field_errors` maps field ids to
    /// messages that belong next to the offending control.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field_errors: BTreeMap<String, String>,
    },

    /// Network/transport failure before a response was received.
    #[error("Request error: {0}")]
    Request(String),

    /// The server answered with a failure status.
    #[error("Server error ({status}): {}", message.as_deref().unwrap_or("no message"))]
    Server {
        status: u16,
        message: Option<String>,
    },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not allowed in the current editing state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// User-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Per-field problem, shown inline; user input is kept.
    Validation,
    /// Shown as a notice and queued for retry.
    NetworkOrServer,
    /// Bulk-only; some items committed, the rest reported in aggregate.
    PartialBatch,
    /// Nothing surfaced; the pending buffer is discarded.
    UserCancelled,
}

impl Error {
    /// Build a validation error from a message and per-field messages.
    pub fn validation<I, K, V>(message: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Error::Validation {
            message: message.into(),
            field_errors: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Per-field validation messages, when the failure carries any.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Error::Validation { field_errors, .. } if !field_errors.is_empty() => {
                Some(field_errors)
            }
            _ => None,
        }
    }

    /// The human-readable message supplied by the server, if any.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Error::Validation { message, .. } => Some(message.as_str()),
            Error::Server { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation { .. } | Error::InvalidInput(_) => ErrorCategory::Validation,
            _ => ErrorCategory::NetworkOrServer,
        }
    }

    /// Whether replaying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Request(_) => true,
            Error::Server { status, .. } => *status >= 500 || *status == 429,
            Error::Internal(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_validation() {
        let err = Error::validation("Invalid metadata", [("category", "Unknown term")]);
        assert_eq!(err.to_string(), "Validation failed: Invalid metadata");
    }

    #[test]
    fn test_error_display_server_without_message() {
        let err = Error::Server {
            status: 502,
            message: None,
        };
        assert_eq!(err.to_string(), "Server error (502): no message");
    }

    #[test]
    fn test_error_display_document_not_found() {
        let err = Error::DocumentNotFound(42);
        assert_eq!(err.to_string(), "Document not found: 42");
    }

    #[test]
    fn test_field_errors_only_for_non_empty_validation() {
        let err = Error::validation("bad", [("date", "Invalid date")]);
        let fields = err.field_errors().unwrap();
        assert_eq!(fields.get("date").map(String::as_str), Some("Invalid date"));

        let empty = Error::validation("bad", Vec::<(String, String)>::new());
        assert!(empty.field_errors().is_none());

        assert!(Error::Request("offline".into()).field_errors().is_none());
    }

    #[test]
    fn test_user_message() {
        let err = Error::Server {
            status: 500,
            message: Some("Database gone".into()),
        };
        assert_eq!(err.user_message(), Some("Database gone"));
        assert_eq!(Error::Request("timeout".into()).user_message(), None);
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(
            Error::validation("x", [("a", "b")]).category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            Error::Request("down".into()).category(),
            ErrorCategory::NetworkOrServer
        );
        assert_eq!(
            Error::DocumentNotFound(1).category(),
            ErrorCategory::NetworkOrServer
        );
    }

    #[test]
    fn test_retryable() {
        assert!(Error::Request("reset".into()).is_retryable());
        assert!(Error::Server {
            status: 503,
            message: None
        }
        .is_retryable());
        assert!(!Error::Server {
            status: 403,
            message: None
        }
        .is_retryable());
        assert!(!Error::validation("x", [("a", "b")]).is_retryable());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization error:"));
    }

    #[test]
    fn test_error_is_send_sync_clone() {
        fn assert_bounds<T: Send + Sync + Clone>() {}
        assert_bounds::<Error>();
    }
}
