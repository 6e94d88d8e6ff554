//! Error types and HTTP response conversion
//!
//! Every error kind in the protocol (protocol parse errors, unmatched
//! routes, handler failures, send failures, auth denial, middleware
//! misuse, client timeouts, client-side protocol errors) is a distinct
//! variant here rather than a generic string, so dispatcher and client
//! code can match on kind instead of sniffing messages.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using the crate's error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the protocol core
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Inbound frame was not valid JSON, or was missing a required field
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No registered route matched an inbound request frame
    #[error("No route matched for: {method} {url}")]
    NoRouteMatched {
        /// The method of the unmatched frame
        method: String,
        /// The url of the unmatched frame
        url: String,
    },

    /// A handler returned an application-level error
    #[error("Handler error: {0}")]
    Handler(String),

    /// Writing a frame to a connection's socket failed
    #[error("Send failure: {0}")]
    SendFailure(String),

    /// The auth gate denied a request
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A middleware invoked `next` more than once
    #[error("Middleware misuse: next() called twice in `{0}`")]
    MiddlewareMisuse(String),

    /// A client-side pending request exceeded its timeout
    #[error("Request timed out: {0}")]
    ClientTimeout(String),

    /// A client received a frame it could not parse or validate
    #[error("Client protocol error: {0}")]
    ClientProtocol(String),

    /// The WebSocket client is closed and cannot accept new work
    #[error("Client is closed")]
    ClientClosed,

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Error::Config(Box::new(e))
    }
}

/// Error response body, mirroring the wire frame's `{error: ...}` shape
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

impl Error {
    /// Map this error to an HTTP status code, for the HTTP-adjacent
    /// surfaces (upgrade rejection, auth gate).
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::NoRouteMatched { .. } => StatusCode::NOT_FOUND,
            Error::Protocol(_) | Error::ClientProtocol(_) => StatusCode::BAD_REQUEST,
            Error::ClientTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message surfaced in an error frame's `data.error` field.
    #[must_use]
    pub fn wire_message(&self) -> String {
        match self {
            Error::NoRouteMatched { method, url } => {
                format!("No route matched for: {method} {url}")
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(ErrorResponse::new(self.wire_message()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_route_matched_wire_message() {
        let err = Error::NoRouteMatched {
            method: "GET".into(),
            url: "/api/nonexistent".into(),
        };
        assert_eq!(err.wire_message(), "No route matched for: GET /api/nonexistent");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unauthorized_maps_to_401() {
        let err = Error::Unauthorized("no session user".into());
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn middleware_misuse_message() {
        let err = Error::MiddlewareMisuse("observability".into());
        assert!(err.to_string().contains("observability"));
    }
}
