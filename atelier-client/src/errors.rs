//! Request-layer error types
//!
//! Every failure a service call can produce funnels into [`ApiError`] so
//! callers match on one enum and views get a short message from
//! [`ApiError::user_message`].

use atelier_model::ModelError;
use reqwest::StatusCode;
use thiserror::Error;

/// Boxed transport failure, kept intact as the error source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The transport could not complete the exchange (DNS, TLS, reset,
    /// timeout). The original error is preserved as the source.
    #[error("network error: {0}")]
    Network(#[source] BoxError),

    /// A 401 could not be recovered by refreshing the session.
    #[error("session expired, please sign in again")]
    SessionExpired,

    /// The server answered with a non-success status.
    #[error("request failed with status {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// A success response carried a body that does not match the expected
    /// shape.
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Input rejected locally before any request was made.
    #[error("validation failed: {0}")]
    Validation(String),
}

impl ApiError {
    pub fn network(err: impl Into<BoxError>) -> Self {
        ApiError::Network(err.into())
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }

    /// Short, human-readable text for notifications.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => {
                "Unable to reach the server. Check your connection.".to_string()
            }
            ApiError::SessionExpired => {
                "Your session has expired. Please sign in again.".to_string()
            }
            ApiError::Status { message, .. } => message.clone(),
            ApiError::Decode(_) => {
                "The server sent an unexpected response.".to_string()
            }
            ApiError::InvalidUrl(_) => "Invalid request address.".to_string(),
            ApiError::Validation(reason) => reason.clone(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(Box::new(err))
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
