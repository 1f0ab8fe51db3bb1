//! Pipeline settings loading and validation.
//!
//! Reads `chatpipe.yaml` and resolves environment variables. Settings are the
//! single source of truth for the model endpoint, sampling temperatures, the
//! pipeline mode and where the tool servers document lives.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::errors::InferenceError;

/// File name searched for by [`find_config_path`].
pub const SETTINGS_FILE_NAME: &str = "chatpipe.yaml";

// ─── Public Types ────────────────────────────────────────────────────────────

/// How the orchestrator reaches the tool stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Ask the model whether a tool is needed, then call it if so.
    #[default]
    DecideThenCall,
    /// Skip the decision call and always use the first registered tool.
    AlwaysCall,
}

/// Runtime settings for one pipeline instance (mirrors `chatpipe.yaml`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Base URL of the OpenAI-compatible API, without `/chat/completions`.
    pub endpoint: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Temperature for structured (JSON) asks.
    pub structured_temperature: f32,
    /// Temperature for natural-language asks.
    pub natural_temperature: f32,
    pub max_tokens: u32,
    /// Per-request timeout. A hung upstream call fails after this long.
    pub request_timeout_secs: u64,
    /// How many prior turns are included in each prompt.
    pub history_window: usize,
    pub mode: PipelineMode,
    /// Path or `http(s)` URL of the `toolServers` document.
    pub tool_config: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            structured_temperature: 0.1,
            natural_temperature: 0.7,
            max_tokens: 1024,
            request_timeout_secs: 60,
            history_window: 10,
            mode: PipelineMode::DecideThenCall,
            tool_config: None,
        }
    }
}

impl PipelineSettings {
    /// Reject settings that would make every request fail.
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.endpoint.trim().is_empty() {
            return Err(InferenceError::Config {
                reason: "endpoint must not be empty".into(),
            });
        }
        if self.model.trim().is_empty() {
            return Err(InferenceError::Config {
                reason: "model must not be empty".into(),
            });
        }
        for (name, value) in [
            ("structured_temperature", self.structured_temperature),
            ("natural_temperature", self.natural_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(InferenceError::Config {
                    reason: format!("{name} must be within 0.0..=2.0 (got {value})"),
                });
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(InferenceError::Config {
                reason: "request_timeout_secs must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Resolve the settings path relative to the project root.
///
/// Searches upward from `start` for `chatpipe.yaml`. Checks the
/// `CHATPIPE_PROJECT_ROOT` env var first.
pub fn find_config_path(start: &Path) -> Result<PathBuf, InferenceError> {
    if let Ok(root) = std::env::var("CHATPIPE_PROJECT_ROOT") {
        let candidate = PathBuf::from(&root).join(SETTINGS_FILE_NAME);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(SETTINGS_FILE_NAME);
        if candidate.exists() {
            return Ok(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    Err(InferenceError::Config {
        reason: format!("could not find {SETTINGS_FILE_NAME}"),
    })
}

/// Load, interpolate and validate the settings file.
///
/// Performs environment-variable interpolation on `${VAR_NAME}` and
/// `${VAR_NAME:-default}` before parsing.
pub fn load_settings(path: &Path) -> Result<PipelineSettings, InferenceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| InferenceError::Config {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    parse_settings(&raw)
}

/// Parse settings from YAML text (after env interpolation).
pub fn parse_settings(raw: &str) -> Result<PipelineSettings, InferenceError> {
    let interpolated = interpolate_env_vars(raw);

    // An empty document means "all defaults".
    let settings: PipelineSettings = if interpolated.trim().is_empty() {
        PipelineSettings::default()
    } else {
        serde_yaml::from_str(&interpolated).map_err(|e| InferenceError::Config {
            reason: format!("failed to parse settings: {e}"),
        })?
    };

    settings.validate()?;
    Ok(settings)
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Expand `${VAR}`, `${VAR:-default}` and `${VAR-default}` the way a POSIX
/// shell does: `:-` falls back when the variable is unset *or empty*, `-`
/// only when it is unset. Defaults get `~` expansion. An unterminated `${`
/// is copied through unchanged.
fn interpolate_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        out.push_str(&resolve_var_expr(&after[..close]));
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

fn resolve_var_expr(expr: &str) -> String {
    let lookup = |name: &str| std::env::var(name.trim()).ok();

    if let Some((name, default)) = expr.split_once(":-") {
        return match lookup(name) {
            Some(value) if !value.is_empty() => value,
            _ => expand_tilde(default),
        };
    }
    if let Some((name, default)) = expr.split_once('-') {
        return lookup(name).unwrap_or_else(|| expand_tilde(default));
    }
    lookup(expr).unwrap_or_default()
}

/// Expand `~` or a leading `~/` to the user's home directory. `~user` forms
/// are left alone.
pub(crate) fn expand_tilde(path: &str) -> String {
    let rest = match path {
        "~" => "",
        _ => match path.strip_prefix("~/") {
            Some(rest) => rest,
            None => return path.to_string(),
        },
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home.display().to_string(),
        Some(home) => home.join(rest).display().to_string(),
        None => path.to_string(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_env_vars_with_default() {
        std::env::remove_var("__CHATPIPE_NONEXISTENT_VAR__");
        let input = "${__CHATPIPE_NONEXISTENT_VAR__:-/fallback/path}";
        assert_eq!(interpolate_env_vars(input), "/fallback/path");
    }

    #[test]
    fn test_interpolate_env_vars_with_value() {
        std::env::set_var("__CHATPIPE_TEST_VAR__", "http://example.test/v1");
        let input = "endpoint: ${__CHATPIPE_TEST_VAR__:-http://localhost}";
        assert_eq!(interpolate_env_vars(input), "endpoint: http://example.test/v1");
        std::env::remove_var("__CHATPIPE_TEST_VAR__");
    }

    #[test]
    fn test_interpolate_empty_var_uses_colon_default_only() {
        std::env::set_var("__CHATPIPE_EMPTY_VAR__", "");
        assert_eq!(
            interpolate_env_vars("model: ${__CHATPIPE_EMPTY_VAR__:-gpt-4o-mini}"),
            "model: gpt-4o-mini"
        );
        assert_eq!(
            interpolate_env_vars("model: ${__CHATPIPE_EMPTY_VAR__-gpt-4o-mini}"),
            "model: "
        );
        std::env::remove_var("__CHATPIPE_EMPTY_VAR__");
        assert_eq!(
            interpolate_env_vars("model: ${__CHATPIPE_EMPTY_VAR__-fallback}"),
            "model: fallback"
        );
    }

    #[test]
    fn test_interpolate_unterminated_is_literal() {
        std::env::remove_var("__CHATPIPE_UNSET_VAR__");
        assert_eq!(
            interpolate_env_vars("a: ${__CHATPIPE_UNSET_VAR__}b ${oops"),
            "a: b ${oops"
        );
    }

    #[test]
    fn test_interpolate_no_vars() {
        let input = "plain text with $dollar but no braces";
        assert_eq!(interpolate_env_vars(input), input);
    }

    #[test]
    fn test_expand_tilde() {
        let result = expand_tilde("~/tools.json");
        assert!(!result.starts_with('~'), "tilde should be expanded");
        assert!(result.ends_with("/tools.json"));
        assert_eq!(expand_tilde("~alice/tools.json"), "~alice/tools.json");
        assert_eq!(expand_tilde("relative/~/x"), "relative/~/x");
    }

    #[test]
    fn test_defaults_when_fields_missing() {
        let settings = parse_settings("model: gpt-4o\n").unwrap();
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.endpoint, "https://api.openai.com/v1");
        assert_eq!(settings.mode, PipelineMode::DecideThenCall);
        assert_eq!(settings.history_window, 10);
        assert!(settings.tool_config.is_none());
    }

    #[test]
    fn test_empty_document_is_all_defaults() {
        let settings = parse_settings("").unwrap();
        assert_eq!(settings.max_tokens, 1024);
    }

    #[test]
    fn test_mode_always_call() {
        let settings = parse_settings("mode: always_call\n").unwrap();
        assert_eq!(settings.mode, PipelineMode::AlwaysCall);
    }

    #[test]
    fn test_invalid_temperature_rejected() {
        let result = parse_settings("natural_temperature: 3.5\n");
        assert!(matches!(result, Err(InferenceError::Config { .. })));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        let result = parse_settings("endpoint: [unclosed\n");
        assert!(matches!(result, Err(InferenceError::Config { .. })));
    }

    #[test]
    fn test_load_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(
            &path,
            "endpoint: http://localhost:8080/v1\ntool_config: mcp_config.json\n",
        )
        .unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.endpoint, "http://localhost:8080/v1");
        assert_eq!(settings.tool_config.as_deref(), Some("mcp_config.json"));
    }

    #[test]
    fn test_find_config_path_walks_upward() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE_NAME), "").unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_config_path(&nested).unwrap();
        assert_eq!(found, dir.path().join(SETTINGS_FILE_NAME));
    }
}
