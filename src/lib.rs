//! chatpipe — a conversational pipeline that decides per message whether an
//! MCP tool server is needed, optionally calls it, and formats the reply.

pub mod agent_core;
pub mod inference;
pub mod mcp_client;

#[cfg(test)]
mod test_support;

pub use agent_core::{
    ChatTurn, Conversation, Decision, FnSink, LogSink, NullSink, Pipeline, PipelineError,
    RunLog, RunRequest, TurnRole,
};
pub use inference::{ChatBackend, InferenceError, ModelClient, PipelineMode, PipelineSettings};
pub use mcp_client::{ToolConfig, ToolConfigSource, ToolInvoker, ToolRegistry};

/// Install the tracing subscriber, writing structured logs to stderr.
///
/// Filter comes from `RUST_LOG`, defaulting to `chatpipe=info,warn` with the
/// `chatpipe::progress` mirror turned off (the binary prints those lines
/// itself). Meant for binaries; the library never installs a subscriber.
/// Calling it twice is harmless.
pub fn init_tracing() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chatpipe=info,chatpipe::progress=off,warn"));

    let _ = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "=== chatpipe starting ===");
}
