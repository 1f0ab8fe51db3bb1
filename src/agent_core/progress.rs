//! Progress log sink.
//!
//! Every stage takes a `&mut dyn LogSink` and reports one line per notable
//! step. The sink belongs to the caller (typically a UI panel); the pipeline
//! never depends on anyone reading it. Lines are mirrored to `tracing`.

/// Receives progress lines for one pipeline run.
pub trait LogSink: Send {
    fn emit(&mut self, line: String);
}

impl LogSink for Vec<String> {
    fn emit(&mut self, line: String) {
        self.push(line);
    }
}

/// Adapts any `FnMut(String)` callback into a sink.
pub struct FnSink<F>(pub F);

impl<F> LogSink for FnSink<F>
where
    F: FnMut(String) + Send,
{
    fn emit(&mut self, line: String) {
        (self.0)(line);
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn emit(&mut self, _line: String) {}
}

/// Line buffer scoped to a single run. Clear it before starting the next one.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunLog {
    lines: Vec<String>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

impl LogSink for RunLog {
    fn emit(&mut self, line: String) {
        self.lines.push(line);
    }
}

/// Send a line to the sink and to `tracing`.
pub fn report(log: &mut dyn LogSink, line: impl Into<String>) {
    let line = line.into();
    tracing::info!(target: "chatpipe::progress", "{line}");
    log.emit(line);
}

/// Shorten `text` to `max_chars` characters for log lines.
pub fn preview(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

// ─── Tests ───────────────────────────────────────────────────────────────────
