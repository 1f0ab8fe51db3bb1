//! Agent Core error types.
//!
//! These never reach the caller of [`Pipeline::run`](super::orchestrator::Pipeline::run):
//! the orchestrator's outer boundary turns them into apology replies.

use thiserror::Error;

use crate::inference::InferenceError;
use crate::mcp_client::McpError;

/// Errors that can stop a pipeline run before a reply is formatted.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Tool configuration could not be loaded or resolved.
    #[error(transparent)]
    Tools(#[from] McpError),

    /// Model client construction or settings failure.
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// A stage produced a state the orchestrator cannot continue from.
    #[error("pipeline invariant violated: {reason}")]
    Internal { reason: String },
}

impl PipelineError {
    /// Whether the run failed because the tool configuration did not load.
    pub fn is_config_load(&self) -> bool {
        matches!(self, PipelineError::Tools(McpError::ConfigLoad { .. }))
    }
}
