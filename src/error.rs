use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Unified error type for the relay
#[derive(Error, Debug)]
pub enum RelayError {
    // Forwarding errors
    #[error("Invalid upstream target: {0}")]
    InvalidTarget(String),

    #[error("Failed to build upstream request: {0}")]
    RequestBuild(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Timed out waiting for a connection slot")]
    PoolTimeout,

    #[error("Upstream did not respond in time")]
    UpstreamTimeout,

    // Routing
    #[error("Not found")]
    NotFound,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            RelayError::InvalidTarget(_) => StatusCode::BAD_REQUEST,

            // 404 Not Found
            RelayError::NotFound => StatusCode::NOT_FOUND,

            // 502 Bad Gateway
            RelayError::Upstream(_) | RelayError::PoolTimeout | RelayError::UpstreamTimeout => {
                StatusCode::BAD_GATEWAY
            }

            // 500 Internal Server Error
            RelayError::RequestBuild(_)
            | RelayError::InvalidConfig(_)
            | RelayError::Io(_)
            | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message written to the client. Never carries the underlying detail.
    pub fn public_message(&self) -> &'static str {
        match self {
            RelayError::InvalidTarget(_) => "Invalid URL",
            RelayError::RequestBuild(_) => "Failed to create proxy request",
            RelayError::Upstream(_) | RelayError::PoolTimeout | RelayError::UpstreamTimeout => {
                "Proxy request failed"
            }
            RelayError::NotFound => "404 page not found",
            RelayError::InvalidConfig(_) | RelayError::Io(_) | RelayError::Internal(_) => {
                "Internal server error"
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", self.public_message()),
        )
            .into_response()
    }
}

impl From<hyper_util::client::legacy::Error> for RelayError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        // The legacy client error only names its kind; the cause is in the chain.
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        RelayError::Upstream(message)
    }
}

impl From<http::Error> for RelayError {
    fn from(err: http::Error) -> Self {
        RelayError::RequestBuild(err.to_string())
    }
}
