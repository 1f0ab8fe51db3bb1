//! Tool invocation seam.
//!
//! The pipeline never talks to a tool server protocol directly; it hands the
//! selected [`ToolConfig`] to a [`ToolInvoker`]. The default
//! [`SimulatedToolInvoker`] asks the model to describe what the server would
//! return. A real transport implements the same trait.

use async_trait::async_trait;

use super::errors::InvokeError;
use super::types::ToolConfig;
use crate::agent_core::conversation::render_transcript;
use crate::agent_core::types::ChatTurn;
use crate::inference::ModelClient;

/// Everything an invoker may need for one call.
pub struct InvocationContext<'a> {
    /// Per-run model client (carries the caller's credential).
    pub client: &'a ModelClient,
    pub history: &'a [ChatTurn],
    pub message: &'a str,
}

/// Executes a call against a tool server and returns its textual result.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(
        &self,
        tool: &ToolConfig,
        ctx: InvocationContext<'_>,
    ) -> Result<String, InvokeError>;
}

/// Model-backed stand-in for a tool server.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedToolInvoker;

#[async_trait]
impl ToolInvoker for SimulatedToolInvoker {
    async fn invoke(
        &self,
        tool: &ToolConfig,
        ctx: InvocationContext<'_>,
    ) -> Result<String, InvokeError> {
        let window = ctx.client.settings().history_window;
        let prompt = build_simulation_prompt(tool, ctx.history, ctx.message, window);

        tracing::info!(tool = %tool.name, "simulating tool server call");
        let text = ctx.client.complete_text(&prompt).await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(InvokeError::EmptyResult {
                tool: tool.name.clone(),
            });
        }
        Ok(text.to_string())
    }
}

/// Prompt asking the model to stand in for `tool`.
pub fn build_simulation_prompt(
    tool: &ToolConfig,
    history: &[ChatTurn],
    message: &str,
    history_window: usize,
) -> String {
    format!(
        "You are acting as the MCP server \"{name}\".\n\n\
         {server}\n\n\
         Conversation so far:\n{transcript}\n\n\
         User request: {message}\n\n\
         Decide which of the server's commands (and which arguments) fit the request. \
         Then describe, concisely and concretely, the information the server would \
         retrieve for it, written as the server's result.",
        name = tool.name,
        server = tool.render(),
        transcript = render_transcript(history, history_window),
    )
}

// ─── Tests ───────────────────────────────────────────────────────────────────
