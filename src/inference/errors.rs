//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility; these types carry the context needed to build
//! meaningful log entries.

use thiserror::Error;

/// Errors that can occur while talking to the chat-completion endpoint.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// No bearer credential was supplied for this run.
    #[error("no API key configured for the model endpoint")]
    Auth,

    /// Non-2xx HTTP response from the model endpoint.
    #[error("upstream error (HTTP {status}): {message}")]
    Upstream {
        status: u16,
        message: String,
    },

    /// TCP/HTTP connection to the model endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed {
        endpoint: String,
        reason: String,
    },

    /// The model endpoint did not respond within the configured timeout.
    #[error("inference timeout after {duration_secs}s")]
    Timeout {
        duration_secs: u64,
    },

    /// A 2xx response whose body is not a chat completion.
    #[error("invalid response from model endpoint: {reason}")]
    InvalidResponse {
        reason: String,
    },

    /// Structured output could not be recovered from the model text.
    #[error("could not parse structured output: {preview}")]
    ParseRecovery {
        preview: String,
    },

    /// Settings loading or validation error.
    #[error("config error: {reason}")]
    Config {
        reason: String,
    },
}

impl InferenceError {
    /// Whether this error means the request never got a model answer
    /// (as opposed to an answer we could not use).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            InferenceError::ConnectionFailed { .. } | InferenceError::Timeout { .. }
        )
    }

    /// HTTP status of an upstream failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            InferenceError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}
