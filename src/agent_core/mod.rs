//! Agent Core — the decide / execute / format pipeline.
//!
//! Submodules:
//! - `decision`: Ask the model whether a tool server is needed, and which
//! - `tool_execution`: Run the selected server through a `ToolInvoker`
//! - `formatting`: Produce the final user-facing reply
//! - `orchestrator`: State machine tying the stages together
//! - `conversation`: Append-only history and transcript rendering
//! - `progress`: Caller-owned progress log sinks
//! - `types`: Shared types across the agent core
//! - `errors`: Agent-level error types

pub mod conversation;
pub mod decision;
pub mod errors;
pub mod formatting;
pub mod orchestrator;
pub mod progress;
pub mod tool_execution;
pub mod types;

// Re-exports for convenience
pub use conversation::Conversation;
pub use errors::PipelineError;
pub use formatting::{FormatMode, FORMAT_APOLOGY};
pub use orchestrator::{error_apology, Pipeline, RunRequest, CONFIG_APOLOGY};
pub use progress::{FnSink, LogSink, NullSink, RunLog};
pub use types::{ChatTurn, Decision, PipelineState, ToolExecution, TurnRole};
