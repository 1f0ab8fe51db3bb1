//! Decision stage: does this message need a tool server, and which one?
//!
//! One structured model call. Every failure (no credential, upstream error,
//! unparsable answer, malformed payload) degrades to "no tool" so the user
//! still gets a reply.

use serde_json::Value;

use super::conversation::render_transcript;
use super::progress::{report, LogSink};
use super::types::{ChatTurn, Decision};
use crate::inference::response_parser::is_parse_sentinel;
use crate::inference::ModelClient;
use crate::mcp_client::{ToolRegistry, ToolResolution};

/// Ask the model whether `message` needs one of the registered tool servers.
///
/// Post-condition: when the result has `needs_tool == true`, its `tool_name`
/// is a key of `registry`.
pub async fn evaluate(
    client: &ModelClient,
    history: &[ChatTurn],
    message: &str,
    registry: &ToolRegistry,
    log: &mut dyn LogSink,
) -> Decision {
    report(
        log,
        format!(
            "Evaluating whether an MCP call is needed ({} server(s) available)...",
            registry.len()
        ),
    );

    let prompt = build_decision_prompt(
        history,
        message,
        registry,
        client.settings().history_window,
    );

    let value = match client.complete_structured(&prompt).await {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, transport = e.is_transport(), "decision call failed");
            if e.is_transport() {
                report(log, format!("Model endpoint unreachable, answering without tools: {e}"));
            } else {
                report(log, format!("Decision call failed, answering without tools: {e}"));
            }
            return Decision::no_tool(format!("Decision call failed: {e}"));
        }
    };

    if is_parse_sentinel(&value) {
        report(log, "Could not parse the decision response; answering without tools");
        let reasoning = value
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Decision::no_tool(reasoning);
    }

    let decision = match serde_json::from_value::<Decision>(value) {
        Ok(decision) => decision,
        Err(e) => {
            report(log, "Decision response had no usable needsTool flag; answering without tools");
            return Decision::no_tool(format!("Decision response was malformed: {e}"));
        }
    };

    let decision = reconcile(decision, registry, log);
    report(log, describe(&decision));
    decision
}

/// Make a model decision consistent with the registry.
///
/// A positive decision with a missing or unknown tool name gets the first
/// registered server; with an empty registry it becomes negative.
pub fn reconcile(mut decision: Decision, registry: &ToolRegistry, log: &mut dyn LogSink) -> Decision {
    if !decision.needs_tool {
        decision.tool_name = None;
        return decision;
    }

    let requested = decision
        .tool_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    match registry.resolve(requested) {
        None => {
            report(log, "Model asked for a tool but no MCP servers are configured");
            Decision::no_tool(format!(
                "{} (no MCP servers are configured)",
                decision.reasoning
            ))
        }
        Some(ToolResolution::Found(tool)) => {
            decision.tool_name = Some(tool.name.clone());
            decision
        }
        Some(ToolResolution::Substituted { requested, tool }) => {
            let line = match requested {
                Some(name) => format!(
                    "Unknown MCP server \"{name}\"; falling back to \"{}\"",
                    tool.name
                ),
                None => format!("No MCP server named; falling back to \"{}\"", tool.name),
            };
            tracing::warn!(tool = %tool.name, "substituted first registered tool server");
            report(log, line);
            decision.tool_name = Some(tool.name.clone());
            decision
        }
    }
}

fn describe(decision: &Decision) -> String {
    match decision.selected_tool() {
        Some(name) => format!(
            "Decision: use MCP server \"{name}\" ({})",
            decision.reasoning
        ),
        None => format!("Decision: no MCP call needed ({})", decision.reasoning),
    }
}

/// Prompt listing the servers, the rubric and the expected JSON shape.
pub fn build_decision_prompt(
    history: &[ChatTurn],
    message: &str,
    registry: &ToolRegistry,
    history_window: usize,
) -> String {
    let names = if registry.is_empty() {
        "(none)".to_string()
    } else {
        registry
            .names()
            .iter()
            .map(|n| format!("\"{n}\""))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "You are the routing step of a chat assistant. Decide whether answering the \
         user's latest message requires calling one of the MCP servers below.\n\n\
         Available MCP servers:\n{servers}\n\n\
         Conversation so far:\n{transcript}\n\n\
         User's latest message: {message}\n\n\
         Guidelines:\n\
         - Do NOT use a tool (needsTool=false) for greetings, small talk, opinions, \
         creative writing, or general knowledge you can answer reliably yourself.\n\
         - Use a tool (needsTool=true) only when the message needs real-time or current \
         data, specialized computation, or a domain-specific lookup that one of the \
         servers above provides.\n\
         - If no listed server fits, do not use a tool.\n\
         - toolName must be exactly one of: {names}.\n\n\
         Respond with a single JSON object and nothing else:\n\
         {{\"needsTool\": true or false, \"toolName\": \"<server name, only when needsTool is true>\", \
         \"reasoning\": \"<one short sentence>\"}}",
        servers = registry.describe_for_prompt(),
        transcript = render_transcript(history, history_window),
    )
}

// ─── Tests ───────────────────────────────────────────────────────────────────
