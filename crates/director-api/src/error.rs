//! Transport-facing error taxonomy of the facade.

use director_ipvs::AdminError;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request payload failed validation; the offending payload is
    /// echoed in `details`.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Human-readable reason.
        message: String,
        /// The offending payload, serialized.
        details: Option<serde_json::Value>,
    },

    /// The requested entity does not exist.
    #[error("{0} is not found")]
    NotFound(String),

    /// The request or the process was canceled.
    #[error("canceled")]
    Canceled,

    /// The request deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Anything unclassified.
    #[error("internal: {0}")]
    Internal(String),
}

impl ApiError {
    /// Build an `InvalidArgument` echoing `details`.
    pub fn invalid_argument<D: Serialize>(message: impl Into<String>, details: &D) -> Self {
        Self::InvalidArgument {
            message: message.into(),
            details: serde_json::to_value(details).ok(),
        }
    }
}

impl From<AdminError> for ApiError {
    /// Mapping for driver errors outside a fan-out (listings, handle
    /// failures). Fan-outs classify explicitly before falling back here.
    fn from(err: AdminError) -> Self {
        match err {
            // a transport error that is really a timeout surfaces as one
            AdminError::Netlink(msg) if msg.contains("timed out") => Self::DeadlineExceeded,
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Result alias for facade operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_errors_default_to_internal() {
        let err: ApiError = AdminError::VirtualServerNotExist.into();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn timed_out_transport_errors_become_deadline_exceeded() {
        let err: ApiError = AdminError::Netlink("request to IPVS family: timed out".into()).into();
        assert_eq!(err, ApiError::DeadlineExceeded);
    }

    #[test]
    fn invalid_argument_echoes_details() {
        let err = ApiError::invalid_argument("bad identity", &serde_json::json!({"mark": 0}));
        let ApiError::InvalidArgument { details, .. } = err else {
            panic!("wrong kind");
        };
        assert_eq!(details, Some(serde_json::json!({"mark": 0})));
    }
}
