//! Tool registry — the declared tool servers for one pipeline run.
//!
//! Provides:
//! - Lookup by server name
//! - Deterministic fallback to the first registered server
//! - Serialization of servers into the decision prompt format
//!
//! Registration order is preserved; "first" always means the first server
//! declared in the configuration document.

use super::errors::McpError;
use super::types::ToolConfig;

// ─── ToolRegistry ────────────────────────────────────────────────────────────

/// Ordered, read-only view of the configured tool servers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolRegistry {
    tools: Vec<ToolConfig>,
}

/// Outcome of resolving a model-provided tool name.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResolution<'a> {
    /// The name matched a registered server.
    Found(&'a ToolConfig),
    /// The name was missing or unknown; the first registered server is used.
    Substituted {
        requested: Option<String>,
        tool: &'a ToolConfig,
    },
}

impl<'a> ToolResolution<'a> {
    pub fn tool(&self) -> &'a ToolConfig {
        match self {
            ToolResolution::Found(tool) => tool,
            ToolResolution::Substituted { tool, .. } => tool,
        }
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Build a registry, rejecting blank or duplicate names.
    pub fn from_configs(configs: Vec<ToolConfig>) -> Result<Self, McpError> {
        let mut registry = Self::new();
        for config in configs {
            if config.name.trim().is_empty() {
                return Err(McpError::ConfigLoad {
                    origin: "tool registry".into(),
                    reason: "tool server name must not be empty".into(),
                });
            }
            if registry.contains(&config.name) {
                return Err(McpError::ConfigLoad {
                    origin: "tool registry".into(),
                    reason: format!("duplicate tool server '{}'", config.name),
                });
            }
            registry.tools.push(config);
        }
        Ok(registry)
    }

    /// Look up a server by its exact name.
    pub fn get(&self, name: &str) -> Option<&ToolConfig> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Look up a server by name, or fail with [`McpError::UnknownTool`].
    pub fn require(&self, name: &str) -> Result<&ToolConfig, McpError> {
        self.get(name).ok_or_else(|| McpError::UnknownTool {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The first registered server, used as the deterministic fallback.
    pub fn first(&self) -> Option<&ToolConfig> {
        self.tools.first()
    }

    /// Resolve a model-provided name against the registry.
    ///
    /// Exact match first, then a trimmed case-insensitive match. Anything else
    /// (including no name at all) falls back to the first registered server.
    /// Returns `None` only when the registry is empty.
    pub fn resolve(&self, requested: Option<&str>) -> Option<ToolResolution<'_>> {
        if let Some(name) = requested {
            if let Some(tool) = self.get(name) {
                return Some(ToolResolution::Found(tool));
            }
            let wanted = name.trim();
            if let Some(tool) = self
                .tools
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(wanted))
            {
                return Some(ToolResolution::Found(tool));
            }
        }

        self.first().map(|tool| ToolResolution::Substituted {
            requested: requested.map(String::from),
            tool,
        })
    }

    /// Registered server names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolConfig> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render every server for the decision prompt.
    pub fn describe_for_prompt(&self) -> String {
        if self.is_empty() {
            return "No MCP servers are currently available.".to_string();
        }
        self.tools
            .iter()
            .map(ToolConfig::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
