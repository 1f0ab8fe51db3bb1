//! Conversation history — append-only sequence of turns.
//!
//! The caller owns the history; the pipeline only reads it. [`Conversation`]
//! is a convenience for callers that want the append-only contract enforced
//! by the type.

use super::types::{ChatTurn, TurnRole};

/// Ordered, append-only conversation history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<ChatTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Start from existing turns (e.g. loaded by the caller).
    pub fn from_turns(turns: Vec<ChatTurn>) -> Self {
        Self { turns }
    }

    /// Append a turn. Turns are never edited, removed or reordered.
    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    /// Append a user message and the reply it produced.
    pub fn record_exchange(&mut self, message: impl Into<String>, reply: impl Into<String>) {
        self.push(ChatTurn::user(message));
        self.push(ChatTurn::assistant(reply));
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Render the last `window` turns as `Role: content` lines for a prompt.
///
/// System turns are kept; they often carry instructions the user set.
pub fn render_transcript(history: &[ChatTurn], window: usize) -> String {
    if history.is_empty() || window == 0 {
        return "(no previous messages)".to_string();
    }

    let start = history.len().saturating_sub(window);
    history[start..]
        .iter()
        .map(|turn| format!("{}: {}", turn.role(), turn.content().trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Count of turns by role (used for run logging).
pub fn count_by_role(history: &[ChatTurn], role: TurnRole) -> usize {
    history.iter().filter(|t| t.role() == role).count()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
