use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Raised while building a [`Client`](crate::Client), before any request is sent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API key is required")]
    MissingApiKey,

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Request timeout must be greater than zero")]
    ZeroTimeout,
}

/// Normalized error for every failed API call.
///
/// `status` carries the HTTP status of the response. It is 0 when no response
/// was received at all: the request timed out, the connection failed, or the
/// parameters were rejected locally.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub status: u16,
    pub details: Value,
}

impl ApiError {
    pub const API_ERROR: &'static str = "API_ERROR";
    pub const TIMEOUT: &'static str = "TIMEOUT";
    pub const NETWORK_ERROR: &'static str = "NETWORK_ERROR";
    pub const DECODE_ERROR: &'static str = "DECODE_ERROR";
    pub const INVALID_PARAMS: &'static str = "INVALID_PARAMS";

    pub fn timeout(after: Duration) -> Self {
        Self {
            code: Self::TIMEOUT.into(),
            message: format!("Request timeout after {}ms", after.as_millis()),
            status: 0,
            details: Value::Null,
        }
    }

    pub fn network(err: reqwest::Error) -> Self {
        Self {
            code: Self::NETWORK_ERROR.into(),
            message: format!("Request failed: {err}"),
            status: 0,
            details: Value::Null,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: Self::INVALID_PARAMS.into(),
            message: message.into(),
            status: 0,
            details: Value::Null,
        }
    }

    /// A 2xx response whose body did not have the expected shape.
    pub fn decode(status: StatusCode, err: serde_json::Error, body: &str) -> Self {
        Self {
            code: Self::DECODE_ERROR.into(),
            message: format!("Failed to decode response body: {err}"),
            status: status.as_u16(),
            details: Value::String(body.into()),
        }
    }

    /// Builds the error for a non-success response. Any JSON body is kept as
    /// `details`; `code`/`message` are taken from it only when it is an object
    /// carrying those strings, otherwise generic values are used.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let details = serde_json::from_str::<Value>(body)
            .unwrap_or_else(|_| Value::Object(Default::default()));

        let field = |name: &str| {
            details
                .as_object()
                .and_then(|obj| obj.get(name))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };

        let code = field("code").unwrap_or_else(|| Self::API_ERROR.into());
        let message = field("message").unwrap_or_else(|| {
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status")
            )
        });

        Self {
            code,
            message,
            status: status.as_u16(),
            details,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.code == Self::TIMEOUT
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND.as_u16() || self.code.contains("NOT_FOUND")
    }
}
