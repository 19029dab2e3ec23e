use std::{io, time::Duration};

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// TransportFailure
///
/// Everything that can go wrong while a request is on the wire. Produced by the
/// transport service and consumed only by the response interceptor, which turns it
/// into an [`ApiError`].
#[derive(Debug, Error)]
pub enum TransportFailure {
    /// The server answered with a non-success status.
    #[error("Request failed with status code {}", .status.as_u16())]
    Status {
        status: StatusCode,
        /// Error body parsed as JSON, when the server sent one.
        body: Option<Value>,
    },

    #[error("timeout of {}ms exceeded", .0.as_millis())]
    Timeout(Duration),

    /// Connection refused, DNS failure, aborted call, undecodable response and so on.
    #[error("Network Error: {0}")]
    Network(String),
}

impl TransportFailure {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportFailure::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// ApiError
///
/// The normalized error payload application code receives for every failed call.
/// `message` is always human-readable; `details` carries the server's error body
/// verbatim when there was one, otherwise `{ "message": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: Option<u16>,
    pub message: String,
    pub details: Value,
}

impl ApiError {
    /// Builds the payload from a transport failure, preferring the server body.
    pub fn from_failure(failure: &TransportFailure) -> Self {
        let synthesized = failure.to_string();
        let status = failure.status().map(|s| s.as_u16());

        match failure {
            TransportFailure::Status {
                body: Some(body), ..
            } => {
                let message = body
                    .get("message")
                    .and_then(Value::as_str)
                    .filter(|m| !m.trim().is_empty())
                    .map(str::to_string)
                    .or_else(|| body.as_str().map(str::to_string))
                    .unwrap_or(synthesized);
                Self {
                    status,
                    message,
                    details: body.clone(),
                }
            }
            _ => Self {
                status,
                details: json!({ "message": synthesized }),
                message: synthesized,
            },
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(StatusCode::UNAUTHORIZED.as_u16())
    }
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("session record could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}
