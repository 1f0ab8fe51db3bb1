//! Shared types across the agent core.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Conversation ────────────────────────────────────────────────────────────

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

impl TurnRole {
    fn label(self) -> &'static str {
        match self {
            TurnRole::User => "User",
            TurnRole::Assistant => "Assistant",
            TurnRole::System => "System",
        }
    }
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One immutable turn of the conversation.
///
/// Fields are private: a turn cannot change after it is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    role: TurnRole,
    content: String,
}

impl ChatTurn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(TurnRole::System, content)
    }

    pub fn role(&self) -> TurnRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

// ─── Decision ────────────────────────────────────────────────────────────────

/// Whether the incoming message needs a tool server, and which one.
///
/// Uses camelCase on the wire (`needsTool`, `toolName`), as the decision
/// prompt asks for; snake_case keys from the model are accepted too.
/// Deserialization is lenient about value types: `"true"` counts as `true`,
/// and a `null` or non-string `reasoning`/`toolName` is tolerated. Only a
/// missing or meaningless `needsTool` is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    #[serde(alias = "needs_tool", deserialize_with = "loose_bool")]
    pub needs_tool: bool,
    #[serde(
        default,
        alias = "tool_name",
        deserialize_with = "loose_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_name: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub reasoning: String,
}

fn loose_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Bool(flag) => Ok(flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Ok(true),
            "false" | "no" => Ok(false),
            other => Err(de::Error::custom(format!("not a boolean: \"{other}\""))),
        },
        Value::Number(n) if n.as_u64() == Some(1) => Ok(true),
        Value::Number(n) if n.as_u64() == Some(0) => Ok(false),
        other => Err(de::Error::custom(format!("not a boolean: {other}"))),
    }
}

fn loose_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(name) => Some(name),
        _ => None,
    })
}

fn loose_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl Decision {
    /// A negative decision.
    pub fn no_tool(reasoning: impl Into<String>) -> Self {
        Self {
            needs_tool: false,
            tool_name: None,
            reasoning: reasoning.into(),
        }
    }

    /// A positive decision for a known tool.
    pub fn use_tool(tool_name: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            needs_tool: true,
            tool_name: Some(tool_name.into()),
            reasoning: reasoning.into(),
        }
    }

    /// The selected tool, only when a tool is needed.
    pub fn selected_tool(&self) -> Option<&str> {
        if self.needs_tool {
            self.tool_name.as_deref()
        } else {
            None
        }
    }
}

// ─── Tool execution ──────────────────────────────────────────────────────────

/// Result of the tool stage. Both variants carry user-visible text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolExecution {
    Completed(String),
    Failed(String),
}

impl ToolExecution {
    pub fn text(&self) -> &str {
        match self {
            ToolExecution::Completed(text) | ToolExecution::Failed(text) => text,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolExecution::Completed(_))
    }
}

// ─── Pipeline state ──────────────────────────────────────────────────────────

/// Orchestrator states, in the order a run visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Deciding,
    Executing,
    Formatting,
    Done,
}

impl PipelineState {
    /// Whether a run may move from `self` to `next`.
    ///
    /// `Deciding` goes to `Executing` on the tool path or straight to
    /// `Formatting` on the direct path.
    pub fn can_advance_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Start, Deciding)
                | (Deciding, Executing)
                | (Deciding, Formatting)
                | (Executing, Formatting)
                | (Formatting, Done)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Start => "start",
            PipelineState::Deciding => "deciding",
            PipelineState::Executing => "executing",
            PipelineState::Formatting => "formatting",
            PipelineState::Done => "done",
        };
        f.write_str(name)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_turn_roundtrip_roles() {
        let json = r#"[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]"#;
        let turns: Vec<ChatTurn> = serde_json::from_str(json).unwrap();
        assert_eq!(turns[0].role(), TurnRole::User);
        assert_eq!(turns[1].content(), "hello");
    }

    #[test]
    fn test_unknown_role_rejected() {
        let json = r#"{"role":"tool","content":"x"}"#;
        assert!(serde_json::from_str::<ChatTurn>(json).is_err());
    }

    #[test]
    fn test_decision_camel_case() {
        let d: Decision = serde_json::from_str(
            r#"{"needsTool": true, "toolName": "weather", "reasoning": "live data"}"#,
        )
        .unwrap();
        assert_eq!(d, Decision::use_tool("weather", "live data"));
    }

    #[test]
    fn test_decision_snake_case_alias() {
        let d: Decision =
            serde_json::from_str(r#"{"needs_tool": false, "reasoning": "greeting"}"#).unwrap();
        assert!(!d.needs_tool);
        assert!(d.tool_name.is_none());
    }

    #[test]
    fn test_decision_requires_needs_tool() {
        assert!(serde_json::from_str::<Decision>(r#"{"toolName": "x"}"#).is_err());
        assert!(serde_json::from_str::<Decision>(r#"{"needsTool": null}"#).is_err());
        assert!(serde_json::from_str::<Decision>(r#"{"needsTool": "maybe"}"#).is_err());
    }

    #[test]
    fn test_decision_tolerates_loose_value_types() {
        let d: Decision = serde_json::from_str(
            r#"{"needsTool": true, "toolName": "weather", "reasoning": null}"#,
        )
        .unwrap();
        assert_eq!(d, Decision::use_tool("weather", ""));

        let d: Decision =
            serde_json::from_str(r#"{"needsTool": "True", "toolName": null, "reasoning": 42}"#)
                .unwrap();
        assert!(d.needs_tool);
        assert!(d.tool_name.is_none());
        assert_eq!(d.reasoning, "42");

        let d: Decision = serde_json::from_str(r#"{"needs_tool": "false", "tool_name": 7}"#).unwrap();
        assert!(!d.needs_tool);
        assert!(d.tool_name.is_none());
    }

    #[test]
    fn test_decision_serializes_without_null_tool() {
        let json = serde_json::to_string(&Decision::no_tool("hi")).unwrap();
        assert_eq!(json, r#"{"needsTool":false,"reasoning":"hi"}"#);
    }

    #[test]
    fn test_selected_tool_ignores_name_when_not_needed() {
        let d = Decision {
            needs_tool: false,
            tool_name: Some("weather".into()),
            reasoning: String::new(),
        };
        assert!(d.selected_tool().is_none());
    }

    #[test]
    fn test_state_transitions() {
        use PipelineState::*;
        assert!(Start.can_advance_to(Deciding));
        assert!(Deciding.can_advance_to(Formatting));
        assert!(Deciding.can_advance_to(Executing));
        assert!(!Start.can_advance_to(Executing));
        assert!(!Done.can_advance_to(Start));
        assert!(!Formatting.can_advance_to(Executing));
        assert_eq!(Formatting.to_string(), "formatting");
    }

    #[test]
    fn test_tool_execution_text() {
        assert_eq!(ToolExecution::Completed("ok".into()).text(), "ok");
        assert!(!ToolExecution::Failed("Error: x".into()).is_success());
    }
}
