//! Tool server configuration types.
//!
//! Mirrors the `{ "toolServers": { name: ToolConfig } }` document. Servers are
//! declared, not spawned: the pipeline only reads their descriptions and
//! command signatures.

use serde::{Deserialize, Serialize};

fn default_argument_type() -> String {
    "string".to_string()
}

/// One argument of a tool command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentSpec {
    pub name: String,
    #[serde(rename = "type", default = "default_argument_type")]
    pub arg_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

/// A command a tool server offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub arguments: Vec<ArgumentSpec>,
}

/// A tool server declaration. `name` is the key in the `toolServers` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
}

/// Raw top-level document. Entries are kept as a JSON map so that key order
/// (the registration order) survives deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolServersDocument {
    #[serde(rename = "toolServers", alias = "tool_servers")]
    pub tool_servers: serde_json::Map<String, serde_json::Value>,
}

impl ArgumentSpec {
    fn render(&self) -> String {
        let mut line = format!("{} ({}", self.name, self.arg_type);
        if self.required {
            line.push_str(", required");
        }
        line.push(')');
        if !self.description.is_empty() {
            line.push_str(&format!(": {}", self.description));
        }
        line
    }
}

impl CommandSpec {
    /// One prompt line per command, with its arguments inline.
    pub fn render(&self) -> String {
        let mut line = format!("- {}", self.name);
        if !self.description.is_empty() {
            line.push_str(&format!(": {}", self.description));
        }
        if !self.arguments.is_empty() {
            let args: Vec<String> = self.arguments.iter().map(ArgumentSpec::render).collect();
            line.push_str(&format!(" [arguments: {}]", args.join("; ")));
        }
        line
    }
}

impl ToolConfig {
    /// Multi-line description of the server and its commands for prompts.
    pub fn render(&self) -> String {
        let description = if self.description.is_empty() {
            "(no description)"
        } else {
            self.description.as_str()
        };
        let mut out = format!("Server \"{}\": {description}", self.name);
        if self.commands.is_empty() {
            out.push_str("\n  Commands: none declared");
        } else {
            out.push_str("\n  Commands:");
            for command in &self.commands {
                out.push_str("\n    ");
                out.push_str(&command.render());
            }
        }
        out
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
