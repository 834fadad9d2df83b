//! Error types for the facilitator service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pay402::error::PaymentError;

/// Errors that can occur in the facilitator service.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorError {
    /// No scheme handler found for the given scheme/network pair.
    #[error("{0}")]
    SchemeNotFound(#[from] pay402::error::SchemeNotFoundError),

    /// JSON deserialization of the request body failed.
    #[error("invalid request body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    /// Protocol-level error (version detection, missing fields).
    #[error("protocol error: {0}")]
    Protocol(#[from] pay402::ProtocolError),

    /// A lifecycle hook aborted the operation.
    #[error("{0}")]
    Aborted(#[from] pay402::error::PaymentAbortedError),

    /// Scheme execution failed with a system error.
    #[error("scheme error: {0}")]
    Scheme(Box<dyn std::error::Error + Send + Sync>),
}

impl From<PaymentError> for FacilitatorError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::SchemeNotFound(e) => Self::SchemeNotFound(e),
            PaymentError::Aborted(e) => Self::Aborted(e),
            PaymentError::NoMatchingRequirements(e) => Self::Scheme(Box::new(e)),
            PaymentError::Scheme(e) => Self::Scheme(e),
        }
    }
}

impl IntoResponse for FacilitatorError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::SchemeNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidBody(_) | Self::Protocol(_) => StatusCode::BAD_REQUEST,
            Self::Aborted(_) => StatusCode::FORBIDDEN,
            Self::Scheme(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
