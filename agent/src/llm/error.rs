//! Completion service error types

use thiserror::Error;

/// Errors raised by a chat backend
///
/// The first four variants are transient: the invocation wrapper backs off
/// and retries them. Everything else is fatal for the call.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Service overloaded or failing internally (5xx)
    #[error("Service overloaded: {0}")]
    Overloaded(String),

    /// Network/connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request timed out
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Non-retryable API error
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    /// Backend misconfiguration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Whether the invocation wrapper should back off and retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Overloaded(_) | Self::Connection(_) | Self::Timeout(_) | Self::RateLimited(_)
        )
    }

    /// Short kind name for log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Overloaded(_) => "overloaded",
            Self::Connection(_) => "connection",
            Self::Timeout(_) => "timeout",
            Self::RateLimited(_) => "rate_limit",
            Self::Api { .. } => "api",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Config(_) => "config",
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => Self::RateLimited(body),
            408 => Self::Timeout(body),
            500 | 502 | 503 | 504 | 529 => Self::Overloaded(format!("{}: {}", status, body)),
            _ => Self::Api { status, body },
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connect() || e.is_request() {
            Self::Connection(e.to_string())
        } else if let Some(status) = e.status() {
            Self::from_status(status.as_u16(), e.to_string())
        } else {
            Self::InvalidResponse(e.to_string())
        }
    }
}
