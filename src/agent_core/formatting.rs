//! Response formatting stage. Always runs, never fails.

use super::conversation::render_transcript;
use super::progress::{report, LogSink};
use super::types::ChatTurn;
use crate::inference::ModelClient;

/// Returned when the final answer cannot be produced.
pub const FORMAT_APOLOGY: &str =
    "I'm sorry, I wasn't able to put together a response just now. Please try again.";

/// Which prompt template the stage uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatMode {
    /// No tool ran; answer from the conversation alone.
    Direct,
    /// Merge a tool result into the answer.
    WithToolResult,
}

impl FormatMode {
    /// A missing or blank tool result means `Direct`.
    pub fn for_result(tool_result: Option<&str>) -> Self {
        match tool_result {
            Some(text) if !text.trim().is_empty() => FormatMode::WithToolResult,
            _ => FormatMode::Direct,
        }
    }
}

/// Produce the user-facing reply for `message`.
///
/// The template follows from `tool_result`: a missing or blank result gives
/// [`FormatMode::Direct`]. Callers that know which path ran should use
/// [`format_with_mode`].
pub async fn format_response(
    client: &ModelClient,
    history: &[ChatTurn],
    message: &str,
    tool_result: Option<&str>,
    log: &mut dyn LogSink,
) -> String {
    let mode = FormatMode::for_result(tool_result);
    format_with_mode(client, history, message, mode, tool_result.unwrap_or_default(), log).await
}

/// Produce the reply with an explicit template. `tool_result` is ignored in
/// `Direct` mode.
pub async fn format_with_mode(
    client: &ModelClient,
    history: &[ChatTurn],
    message: &str,
    mode: FormatMode,
    tool_result: &str,
    log: &mut dyn LogSink,
) -> String {
    report(
        log,
        match mode {
            FormatMode::Direct => "Formatting a direct response...",
            FormatMode::WithToolResult => "Formatting response with MCP result...",
        },
    );

    let prompt = build_format_prompt(
        history,
        message,
        mode,
        tool_result,
        client.settings().history_window,
    );

    match client.complete_text(&prompt).await {
        Ok(text) if !text.trim().is_empty() => {
            report(log, "Response formatting complete");
            text.trim().to_string()
        }
        Ok(_) => {
            tracing::warn!("formatting call returned an empty answer");
            report(log, "Formatting returned an empty answer");
            FORMAT_APOLOGY.to_string()
        }
        Err(e) => {
            tracing::warn!(error = %e, "formatting call failed");
            report(log, format!("Formatting failed: {e}"));
            FORMAT_APOLOGY.to_string()
        }
    }
}

/// Pure prompt construction for both templates.
pub fn build_format_prompt(
    history: &[ChatTurn],
    message: &str,
    mode: FormatMode,
    tool_result: &str,
    history_window: usize,
) -> String {
    let transcript = render_transcript(history, history_window);

    match mode {
        FormatMode::WithToolResult => {
            let result = match tool_result.trim() {
                "" => "(the server returned no data)",
                text => text,
            };
            format!(
                "Conversation so far:\n{transcript}\n\n\
                 User's latest message: {message}\n\n\
                 An MCP server was called for this message and returned:\n{result}\n\n\
                 Write a helpful, natural reply to the user that uses this result. If the \
                 result reports an error or is empty, explain briefly that the information \
                 could not be retrieved and answer as well as you can without it."
            )
        }
        FormatMode::Direct => format!(
            "Conversation so far:\n{transcript}\n\n\
             User's latest message: {message}\n\n\
             No tools were needed. Reply to the user directly and naturally, taking the \
             conversation into account."
        ),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
