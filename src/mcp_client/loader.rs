//! Tool configuration loading.
//!
//! The `toolServers` document is read once per pipeline run, from a local
//! file or an `http(s)` URL. Any failure here is fatal to the run: it is the
//! one error allowed to short-circuit before a model call.

use std::path::PathBuf;

use reqwest::Client as HttpClient;

use super::errors::McpError;
use super::registry::ToolRegistry;
use super::types::{ToolConfig, ToolServersDocument};
use crate::inference::config::expand_tilde;

/// Where the tool servers document comes from.
#[derive(Debug, Clone)]
pub enum ToolConfigSource {
    File(PathBuf),
    Url(String),
    /// Already loaded (embedding callers and tests).
    Static(ToolRegistry),
}

impl ToolConfigSource {
    /// Interpret a settings/CLI value: `http(s)://…` is a URL, anything else a path.
    pub fn from_location(location: &str) -> Self {
        let trimmed = location.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            ToolConfigSource::Url(trimmed.to_string())
        } else {
            ToolConfigSource::File(PathBuf::from(expand_tilde(trimmed)))
        }
    }

    /// Human-readable origin for logs and errors.
    pub fn describe(&self) -> String {
        match self {
            ToolConfigSource::File(path) => path.display().to_string(),
            ToolConfigSource::Url(url) => url.clone(),
            ToolConfigSource::Static(_) => "in-memory registry".to_string(),
        }
    }
}

/// Load the registry from `source`.
pub async fn load_registry(
    source: &ToolConfigSource,
    http: &HttpClient,
) -> Result<ToolRegistry, McpError> {
    let origin = source.describe();
    let raw = match source {
        ToolConfigSource::Static(registry) => return Ok(registry.clone()),
        ToolConfigSource::File(path) => {
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| McpError::ConfigLoad {
                    origin: origin.clone(),
                    reason: e.to_string(),
                })?
        }
        ToolConfigSource::Url(url) => fetch_document(url, http).await?,
    };

    let registry = parse_tool_servers(&raw, &origin)?;
    tracing::info!(
        origin = %origin,
        servers = registry.len(),
        "loaded tool server configuration"
    );
    Ok(registry)
}

async fn fetch_document(url: &str, http: &HttpClient) -> Result<String, McpError> {
    let response = http.get(url).send().await.map_err(|e| McpError::ConfigLoad {
        origin: url.to_string(),
        reason: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(McpError::ConfigLoad {
            origin: url.to_string(),
            reason: format!("HTTP {status}"),
        });
    }

    response.text().await.map_err(|e| McpError::ConfigLoad {
        origin: url.to_string(),
        reason: format!("failed to read body: {e}"),
    })
}

/// Parse a `{ "toolServers": { … } }` document into a registry.
///
/// Each key becomes the server's `name`, overriding any `name` field inside
/// the entry.
pub fn parse_tool_servers(raw: &str, origin: &str) -> Result<ToolRegistry, McpError> {
    let doc: ToolServersDocument =
        serde_json::from_str(raw).map_err(|e| McpError::ConfigLoad {
            origin: origin.to_string(),
            reason: format!("malformed document: {e}"),
        })?;

    let mut configs = Vec::with_capacity(doc.tool_servers.len());
    for (name, value) in doc.tool_servers {
        let mut config: ToolConfig =
            serde_json::from_value(value).map_err(|e| McpError::ConfigLoad {
                origin: origin.to_string(),
                reason: format!("invalid entry for server '{name}': {e}"),
            })?;
        config.name = name;
        configs.push(config);
    }

    ToolRegistry::from_configs(configs).map_err(|e| match e {
        McpError::ConfigLoad { reason, .. } => McpError::ConfigLoad {
            origin: origin.to_string(),
            reason,
        },
        other => other,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
