//! Error types for the Pathao client.
//!
//! # Design
//! `AuthError` is `Clone` because a single authentication attempt resolves
//! every caller waiting on it, and each of them receives its own copy of the
//! outcome. `UpstreamError` carries the upstream error envelope verbatim so
//! callers can act on validation details. A 401 that survives the gateway's
//! one re-authentication is an ordinary `UpstreamError` with status 401.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::http::HttpResponse;

/// Missing or malformed configuration, reported at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Pathao API base URL is required (config or PATHAO_BASE_URL)")]
    MissingBaseUrl,

    #[error("Pathao API credentials are required, missing: {}", missing.join(", "))]
    MissingCredentials { missing: Vec<&'static str> },

    #[error("invalid PATHAO_TIMEOUT {value:?}: expected milliseconds")]
    InvalidTimeout { value: String },
}

/// The request produced no response: connect failure, timeout, broken body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    pub message: String,
    pub timed_out: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            timed_out: err.is_timeout(),
            message: err.to_string(),
        }
    }
}

/// A non-success response from the Pathao API.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("HTTP {status}: {message}")]
pub struct UpstreamError {
    pub status: u16,
    /// Upstream `code`, or the HTTP status when the body has none.
    pub code: i64,
    /// Upstream `type` field.
    pub kind: Option<String>,
    pub message: String,
    pub errors: Option<BTreeMap<String, Vec<String>>>,
    pub validation: Option<BTreeMap<String, Vec<String>>>,
    /// The raw body: parsed JSON, or a JSON string when the body is not JSON.
    pub body: Value,
}

impl UpstreamError {
    pub fn from_response(response: &HttpResponse) -> Self {
        let body = serde_json::from_str::<Value>(&response.body)
            .unwrap_or_else(|_| Value::String(response.body.clone()));

        let field_map = |name: &str| {
            body.get(name)
                .and_then(|v| serde_json::from_value::<BTreeMap<String, Vec<String>>>(v.clone()).ok())
        };

        Self {
            status: response.status,
            code: body
                .get("code")
                .and_then(Value::as_i64)
                .unwrap_or(i64::from(response.status)),
            kind: body.get("type").and_then(Value::as_str).map(str::to_owned),
            message: body
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| format!("HTTP {}", response.status)),
            errors: field_map("errors"),
            validation: field_map("validation"),
            body,
        }
    }
}

/// Outcome of a failed authentication attempt, shared by all co-waiters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    #[error("authentication rejected: {0}")]
    Rejected(UpstreamError),

    #[error("authentication request failed: {0}")]
    Transport(TransportError),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("authentication attempt was abandoned")]
    Cancelled,
}

/// Errors returned by the client and the gateway.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("authentication failed: {0}")]
    Auth(AuthError),

    /// Raised without any network I/O. Treat as a back-off signal.
    #[error("circuit breaker is open, retry in {retry_after:?}")]
    BreakerOpen { retry_after: Duration },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("authentication was cancelled before completing")]
    Cancelled,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Cancelled => ApiError::Cancelled,
            other => ApiError::Auth(other),
        }
    }
}

impl ApiError {
    /// The upstream HTTP status, when the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Upstream(err) | ApiError::Auth(AuthError::Rejected(err)) => Some(err.status),
            _ => None,
        }
    }
}
