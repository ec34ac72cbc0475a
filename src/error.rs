//! Context server error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Context server error type
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed caller input (timestamp, payload)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A pipeline precondition did not hold
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// Identity store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Event dispatch failure
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Condition evaluation failure
    #[error("Condition error: {0}")]
    Condition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the fault lies with the caller rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::BadRequest(_))
    }

    /// HTTP status for this error class
    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Invariant(_) => "INVARIANT_VIOLATION",
            Self::Store(_) => "STORE_ERROR",
            Self::Dispatch(_) => "DISPATCH_ERROR",
            Self::Condition(_) => "CONDITION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io(_) | Self::Serialization(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// API error response body
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

/// API error detail
#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }
}

impl From<&Error> for ApiError {
    fn from(err: &Error) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.is_client_error() {
            tracing::debug!(error = %self, "Rejected request");
        } else {
            tracing::error!(error = %self, "Request failed");
        }
        (self.status_code(), Json(ApiError::from(&self))).into_response()
    }
}

/// Result type alias for context server operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_vs_server_class() {
        assert!(Error::BadRequest("timestamp".into()).is_client_error());
        assert!(!Error::Invariant("no identity".into()).is_client_error());
        assert!(!Error::Store("down".into()).is_client_error());

        assert_eq!(
            Error::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Invariant("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_from_error() {
        let err = Error::Dispatch("listener failed".into());
        let api = ApiError::from(&err);
        let json = serde_json::to_string(&api).unwrap();
        assert!(json.contains("\"code\":\"DISPATCH_ERROR\""));
        assert!(json.contains("listener failed"));
    }

    #[test]
    fn test_api_error_not_found() {
        let err = ApiError::not_found("Profile p-1 not found");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"code\":\"NOT_FOUND\""));
        assert!(json.contains("p-1"));
    }

    #[test]
    fn test_into_response_status() {
        let resp = Error::BadRequest("bad".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = Error::Internal("boom".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
