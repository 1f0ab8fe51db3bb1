//! Tool execution stage.
//!
//! Looks the selected server up in the registry and hands it to the
//! [`ToolInvoker`]. Failures come back as `ToolExecution::Failed` text that
//! starts with `Error`; the formatting stage still runs on it.

use super::progress::{preview, report, LogSink};
use super::types::{ChatTurn, ToolExecution};
use crate::inference::ModelClient;
use crate::mcp_client::{InvocationContext, ToolInvoker, ToolRegistry};

const RESULT_PREVIEW_CHARS: usize = 120;

/// Run the named tool server for `message`. Never fails.
pub async fn execute(
    invoker: &dyn ToolInvoker,
    client: &ModelClient,
    tool_name: &str,
    history: &[ChatTurn],
    message: &str,
    registry: &ToolRegistry,
    log: &mut dyn LogSink,
) -> ToolExecution {
    let tool = match registry.require(tool_name) {
        Ok(tool) => tool,
        Err(e) => {
            tracing::warn!(error = %e, "selected tool server is not registered");
            report(log, format!("Cannot call MCP server: {e}"));
            return ToolExecution::Failed(format!(
                "Error: MCP server '{tool_name}' not found in configuration"
            ));
        }
    };

    report(log, format!("Calling MCP server \"{}\"...", tool.name));

    let ctx = InvocationContext {
        client,
        history,
        message,
    };

    match invoker.invoke(tool, ctx).await {
        Ok(result) => {
            tracing::info!(tool = %tool.name, result_chars = result.chars().count(), "tool call completed");
            report(
                log,
                format!(
                    "MCP server \"{}\" returned: {}",
                    tool.name,
                    preview(&result, RESULT_PREVIEW_CHARS)
                ),
            );
            ToolExecution::Completed(result)
        }
        Err(e) => {
            tracing::warn!(tool = %tool.name, error = %e, "tool call failed");
            report(log, format!("MCP call to \"{}\" failed: {e}", tool.name));
            ToolExecution::Failed(format!("Error executing MCP call: {e}"))
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
