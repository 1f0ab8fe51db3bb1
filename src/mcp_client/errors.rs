//! Tool server error types.

use thiserror::Error;

use crate::inference::InferenceError;

/// Errors raised while loading or resolving tool server configuration.
#[derive(Debug, Error)]
pub enum McpError {
    /// The tool servers document could not be read, fetched or parsed.
    #[error("failed to load tool configuration from {origin}: {reason}")]
    ConfigLoad { origin: String, reason: String },

    /// Tool server not found in the registry.
    #[error("unknown tool server: '{name}'")]
    UnknownTool { name: String },
}

/// Errors raised by a [`ToolInvoker`](super::invoker::ToolInvoker).
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The model call behind a simulated invocation failed.
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// The tool answered with nothing usable.
    #[error("tool '{tool}' returned an empty result")]
    EmptyResult { tool: String },

    /// A real tool backend reported a failure.
    #[error("tool '{tool}' failed: {reason}")]
    Failed { tool: String, reason: String },
}
