//! Structured-output extraction — normalizes free-form model text to a JSON object.
//!
//! Models asked for "JSON only" still wrap it in prose or code fences. The
//! parser tries, in order:
//!
//! 1. **strict** — the whole (trimmed) text is one JSON object.
//! 2. **labeled fence** — the first ```` ```json ```` block.
//! 3. **unlabeled fence** — the first ```` ``` ```` block with no info string.
//! 4. **brace span** — the first `{ … }` substring.
//!
//! Only objects are accepted. When nothing parses, [`parse`] returns a
//! "no tool needed" sentinel carrying a prefix of the raw text.

use serde_json::{json, Value};

use super::errors::InferenceError;

/// Maximum characters of raw model text embedded in the sentinel reasoning.
pub const PREVIEW_CHARS: usize = 100;

/// Reasoning prefix used by the sentinel value.
pub const SENTINEL_REASONING_PREFIX: &str = "Failed to parse response: ";

// ─── Public API ──────────────────────────────────────────────────────────────

/// Parse model text into a JSON object, falling back to the sentinel.
///
/// Never fails: an unparsable answer is a recovered failure that reads as
/// "no tool needed".
pub fn parse(text: &str) -> Value {
    match try_parse(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "structured output unparsable, using sentinel");
            parse_sentinel(text)
        }
    }
}

/// Parse model text into a JSON object without the sentinel fallback.
pub fn try_parse(text: &str) -> Result<Value, InferenceError> {
    let trimmed = text.trim();

    if let Some(value) = parse_object(trimmed) {
        return Ok(value);
    }

    let blocks = fenced_blocks(trimmed);

    if let Some(value) = blocks
        .iter()
        .find(|(label, _)| label.eq_ignore_ascii_case("json"))
        .and_then(|(_, body)| parse_object(body.trim()))
    {
        tracing::debug!("structured output recovered from ```json fence");
        return Ok(value);
    }

    if let Some(value) = blocks
        .iter()
        .find(|(label, _)| label.is_empty())
        .and_then(|(_, body)| parse_object(body.trim()))
    {
        tracing::debug!("structured output recovered from unlabeled fence");
        return Ok(value);
    }

    if let Some(value) = brace_candidates(trimmed)
        .into_iter()
        .find_map(parse_object)
    {
        tracing::debug!("structured output recovered from brace span");
        return Ok(value);
    }

    Err(InferenceError::ParseRecovery {
        preview: preview(text),
    })
}

/// The deterministic "no tool needed" value returned for unparsable text.
pub fn parse_sentinel(text: &str) -> Value {
    json!({
        "needsTool": false,
        "reasoning": format!("{SENTINEL_REASONING_PREFIX}{}", preview(text)),
    })
}

/// Whether `value` is the sentinel produced by [`parse_sentinel`].
pub fn is_parse_sentinel(value: &Value) -> bool {
    value.get("needsTool") == Some(&Value::Bool(false))
        && value
            .get("reasoning")
            .and_then(Value::as_str)
            .is_some_and(|r| r.starts_with(SENTINEL_REASONING_PREFIX))
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// First [`PREVIEW_CHARS`] characters of the trimmed text, with `...` when cut.
fn preview(text: &str) -> String {
    let trimmed = text.trim();
    let mut out: String = trimmed.chars().take(PREVIEW_CHARS).collect();
    if trimmed.chars().nth(PREVIEW_CHARS).is_some() {
        out.push_str("...");
    }
    out
}

fn parse_object(candidate: &str) -> Option<Value> {
    serde_json::from_str::<Value>(candidate)
        .ok()
        .filter(Value::is_object)
}

/// All complete fenced blocks as `(info_string, body)` pairs, in order.
fn fenced_blocks(text: &str) -> Vec<(&str, &str)> {
    const FENCE: &str = "```";

    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        let Some(newline) = after_open.find('\n') else {
            break;
        };
        let label = after_open[..newline].trim();
        let body_and_rest = &after_open[newline + 1..];
        let Some(close) = body_and_rest.find(FENCE) else {
            break;
        };
        blocks.push((label, &body_and_rest[..close]));
        rest = &body_and_rest[close + FENCE.len()..];
    }

    blocks
}

/// Brace-delimited substrings worth trying, best first.
///
/// The first candidate is the balanced span starting at the first `{`
/// (braces inside JSON strings are ignored). The second is the greedy
/// first-`{`-to-last-`}` span.
fn brace_candidates(text: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    let Some(start) = text.find('{') else {
        return candidates;
    };

    if let Some(end) = find_matching_brace(text, start) {
        candidates.push(&text[start..=end]);
    }
    if let Some(end) = text.rfind('}') {
        if end > start && candidates.last() != Some(&&text[start..=end]) {
            candidates.push(&text[start..=end]);
        }
    }

    candidates
}

/// Find the `}` closing the `{` at byte offset `start`.
fn find_matching_brace(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

// ─── Tests ───────────────────────────────────────────────────────────────────
