//! Pipeline orchestrator: decide, optionally call a tool server, format.
//!
//! States run strictly in order (`Start -> Deciding -> [Executing] ->
//! Formatting -> Done`) inside one task. Stages absorb their own failures;
//! anything that still reaches [`Pipeline::run`] becomes an apology reply, so
//! the caller always gets text back.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client as HttpClient;
use tracing::Instrument;
use uuid::Uuid;

use super::conversation::count_by_role;
use super::errors::PipelineError;
use super::formatting::FormatMode;
use super::progress::{report, LogSink};
use super::types::{ChatTurn, Decision, PipelineState, ToolExecution, TurnRole};
use super::{decision, formatting, tool_execution};
use crate::inference::client::CONNECT_TIMEOUT;
use crate::inference::{
    ChatBackend, InferenceError, ModelClient, OpenAiBackend, PipelineMode, PipelineSettings,
};
use crate::mcp_client::{
    load_registry, SimulatedToolInvoker, ToolConfigSource, ToolInvoker, ToolRegistry,
};

/// Reply when the tool configuration cannot be loaded.
pub const CONFIG_APOLOGY: &str = "I'm sorry, I couldn't load the tool server configuration, \
    so I can't answer right now. Please check the MCP settings and try again.";

/// Reply for any other failure that escapes the stages.
pub fn error_apology(description: impl std::fmt::Display) -> String {
    format!("I'm sorry, I encountered an error: {description}")
}

/// One user message to answer.
#[derive(Debug, Clone)]
pub struct RunRequest<'a> {
    /// Prior turns, oldest first. Read only.
    pub history: &'a [ChatTurn],
    pub message: &'a str,
    /// Bearer credential for the model endpoint, per run.
    pub credential: Option<String>,
}

/// The chat pipeline. Cheap to share across tasks; runs do not coordinate.
pub struct Pipeline {
    backend: Arc<dyn ChatBackend>,
    invoker: Arc<dyn ToolInvoker>,
    settings: PipelineSettings,
    tool_source: ToolConfigSource,
    http: HttpClient,
}

impl Pipeline {
    /// Pipeline over `backend` with the model-simulated tool invoker.
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        settings: PipelineSettings,
        tool_source: ToolConfigSource,
    ) -> Self {
        Self {
            backend,
            invoker: Arc::new(SimulatedToolInvoker),
            settings,
            tool_source,
            http: HttpClient::new(),
        }
    }

    /// Build the HTTP backend and tool source described by `settings`.
    pub fn from_settings(settings: PipelineSettings) -> Result<Self, PipelineError> {
        settings.validate()?;
        let backend = OpenAiBackend::from_settings(&settings)?;

        let tool_source = match settings.tool_config.as_deref() {
            Some(location) if !location.trim().is_empty() => {
                ToolConfigSource::from_location(location)
            }
            _ => {
                tracing::warn!("no tool_config in settings; running without MCP servers");
                ToolConfigSource::Static(ToolRegistry::new())
            }
        };

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| InferenceError::Config {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            backend: Arc::new(backend),
            invoker: Arc::new(SimulatedToolInvoker),
            settings,
            tool_source,
            http,
        })
    }

    /// Replace the tool invoker (e.g. a real tool server transport).
    pub fn with_invoker(mut self, invoker: Arc<dyn ToolInvoker>) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn with_mode(mut self, mode: PipelineMode) -> Self {
        self.settings.mode = mode;
        self
    }

    pub fn with_tool_source(mut self, source: ToolConfigSource) -> Self {
        self.tool_source = source;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn tool_source(&self) -> &ToolConfigSource {
        &self.tool_source
    }

    /// Answer one message. Always returns reply text, never an error.
    pub async fn run(&self, request: RunRequest<'_>, log: &mut dyn LogSink) -> String {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline_run", run_id = %run_id, mode = ?self.settings.mode);

        let outcome = self.run_stages(request, log).instrument(span).await;

        match outcome {
            Ok(reply) => reply,
            Err(e) if e.is_config_load() => {
                tracing::error!(run_id = %run_id, error = %e, "tool configuration failed to load");
                report(log, format!("Tool configuration failed to load: {e}"));
                CONFIG_APOLOGY.to_string()
            }
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "pipeline run failed");
                report(log, format!("Pipeline error: {e}"));
                error_apology(&e)
            }
        }
    }

    async fn run_stages(
        &self,
        request: RunRequest<'_>,
        log: &mut dyn LogSink,
    ) -> Result<String, PipelineError> {
        let history = request.history;
        // Snapshot: later stages see exactly what the caller sent.
        let message = request.message.to_string();

        let mut state = PipelineState::Start;
        report(
            log,
            format!(
                "Starting pipeline ({} previous turn(s): {} user, {} assistant; mode {:?})",
                history.len(),
                count_by_role(history, TurnRole::User),
                count_by_role(history, TurnRole::Assistant),
                self.settings.mode
            ),
        );

        let registry = load_registry(&self.tool_source, &self.http).await?;
        report(
            log,
            format!(
                "Loaded {} MCP server(s) from {}",
                registry.len(),
                self.tool_source.describe()
            ),
        );

        let client = ModelClient::new(
            self.backend.clone(),
            self.settings.clone(),
            request.credential,
        );
        if !client.has_credential() {
            tracing::warn!("no API key supplied for this run");
            report(log, "No API key supplied; model calls will fail and fall back");
        }

        state = advance(state, PipelineState::Deciding, log)?;
        let decision = match self.settings.mode {
            PipelineMode::DecideThenCall => {
                decision::evaluate(&client, history, &message, &registry, log).await
            }
            PipelineMode::AlwaysCall => always_call(&registry, log),
        };

        let mut tool_result: Option<ToolExecution> = None;
        if let Some(tool_name) = decision.selected_tool() {
            state = advance(state, PipelineState::Executing, log)?;
            tool_result = Some(
                tool_execution::execute(
                    self.invoker.as_ref(),
                    &client,
                    tool_name,
                    history,
                    &message,
                    &registry,
                    log,
                )
                .await,
            );
        }

        state = advance(state, PipelineState::Formatting, log)?;
        // The tool path keeps its template even when the result text is empty.
        let (mode, result_text) = match tool_result.as_ref() {
            Some(execution) => (FormatMode::WithToolResult, execution.text()),
            None => (FormatMode::Direct, ""),
        };
        let reply =
            formatting::format_with_mode(&client, history, &message, mode, result_text, log)
                .await;

        advance(state, PipelineState::Done, log)?;
        Ok(reply)
    }
}

/// Decision used by [`PipelineMode::AlwaysCall`]: the first server, if any.
fn always_call(registry: &ToolRegistry, log: &mut dyn LogSink) -> Decision {
    match registry.first() {
        Some(tool) => {
            report(log, format!("Always-call mode: using MCP server \"{}\"", tool.name));
            Decision::use_tool(tool.name.clone(), "Always-call mode")
        }
        None => {
            report(log, "Always-call mode, but no MCP servers are configured; answering directly");
            Decision::no_tool("Always-call mode with no MCP servers configured")
        }
    }
}

fn advance(
    from: PipelineState,
    to: PipelineState,
    log: &mut dyn LogSink,
) -> Result<PipelineState, PipelineError> {
    if !from.can_advance_to(to) {
        return Err(PipelineError::Internal {
            reason: format!("cannot move from {from} to {to}"),
        });
    }
    tracing::debug!(from = %from, to = %to, "pipeline state transition");
    report(log, format!("State: {from} -> {to}"));
    Ok(to)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::agent_core::formatting::FORMAT_APOLOGY;
    use crate::agent_core::progress::RunLog;
    use crate::test_support::{registry_of, RecordingInvoker, ScriptedBackend};

    fn pipeline(
        script: Vec<Result<String, InferenceError>>,
        tools: &[&str],
        invoker: Arc<RecordingInvoker>,
    ) -> (Pipeline, Arc<ScriptedBackend>) {
        let backend = Arc::new(ScriptedBackend::new(script));
        let pipeline = Pipeline::new(
            backend.clone(),
            PipelineSettings::default(),
            ToolConfigSource::Static(registry_of(tools)),
        )
        .with_invoker(invoker);
        (pipeline, backend)
    }

    fn request<'a>(history: &'a [ChatTurn], message: &'a str) -> RunRequest<'a> {
        RunRequest {
            history,
            message,
            credential: Some("sk-test".into()),
        }
    }

    #[tokio::test]
    async fn test_direct_path() {
        let invoker = Arc::new(RecordingInvoker::succeeding("unused"));
        let (pipeline, backend) = pipeline(
            vec![
                Ok(r#"{"needsTool": false, "reasoning": "greeting"}"#.into()),
                Ok("Hello! How can I help?".into()),
            ],
            &["weather"],
            invoker.clone(),
        );
        let mut log = RunLog::new();

        let reply = pipeline.run(request(&[], "hello"), &mut log).await;

        assert_eq!(reply, "Hello! How can I help?");
        assert_eq!(invoker.call_count(), 0);
        assert_eq!(backend.call_count(), 2);
        assert!(log.contains("State: deciding -> formatting"));
        assert!(!log.contains("executing"));
        assert!(log.contains("State: formatting -> done"));
    }

    #[tokio::test]
    async fn test_tool_path_passes_result_to_formatting() {
        let invoker = Arc::new(RecordingInvoker::succeeding("Paris: 18°C, cloudy"));
        let (pipeline, backend) = pipeline(
            vec![
                Ok(r#"{"needsTool": true, "toolName": "weather", "reasoning": "live"}"#.into()),
                Ok("It's 18°C and cloudy in Paris.".into()),
            ],
            &["weather"],
            invoker.clone(),
        );
        let mut log = RunLog::new();

        let reply = pipeline
            .run(request(&[], "what's the weather in Paris"), &mut log)
            .await;

        assert_eq!(reply, "It's 18°C and cloudy in Paris.");
        assert_eq!(invoker.tools(), vec!["weather".to_string()]);
        assert!(backend.prompt(1).contains("Paris: 18°C, cloudy"));
        assert!(log.contains("State: deciding -> executing"));
        assert!(log.contains("State: executing -> formatting"));
    }

    #[tokio::test]
    async fn test_tool_failure_still_formats() {
        let invoker = Arc::new(RecordingInvoker::failing("server down"));
        let (pipeline, backend) = pipeline(
            vec![
                Ok(r#"{"needsTool": true, "toolName": "weather"}"#.into()),
                Ok("Sorry, I couldn't get the weather.".into()),
            ],
            &["weather"],
            invoker,
        );
        let mut log = RunLog::new();

        let reply = pipeline.run(request(&[], "weather?"), &mut log).await;

        assert_eq!(reply, "Sorry, I couldn't get the weather.");
        assert!(backend.prompt(1).contains("Error executing MCP call"));
    }

    #[tokio::test]
    async fn test_empty_tool_result_uses_tool_template() {
        let invoker = Arc::new(RecordingInvoker::succeeding(""));
        let (pipeline, backend) = pipeline(
            vec![
                Ok(r#"{"needsTool": true, "toolName": "weather"}"#.into()),
                Ok("No data came back, sorry.".into()),
            ],
            &["weather"],
            invoker.clone(),
        );
        let mut log = RunLog::new();

        let reply = pipeline.run(request(&[], "weather?"), &mut log).await;

        assert_eq!(reply, "No data came back, sorry.");
        assert_eq!(invoker.call_count(), 1);
        let prompt = backend.prompt(1);
        assert!(prompt.contains("(the server returned no data)"));
        assert!(!prompt.contains("No tools were needed"));
        assert!(log.contains("Formatting response with MCP result"));
    }

    #[tokio::test]
    async fn test_config_load_failure_makes_no_model_call() {
        let invoker = Arc::new(RecordingInvoker::succeeding("unused"));
        let (pipeline, backend) = pipeline(vec![], &[], invoker.clone());
        let pipeline = pipeline.with_tool_source(ToolConfigSource::File(PathBuf::from(
            "/nonexistent/chatpipe/mcp_config.json",
        )));
        let mut log = RunLog::new();

        let reply = pipeline.run(request(&[], "hello"), &mut log).await;

        assert_eq!(reply, CONFIG_APOLOGY);
        assert_eq!(backend.call_count(), 0);
        assert_eq!(invoker.call_count(), 0);
        assert!(log.contains("Tool configuration failed to load"));
    }

    #[tokio::test]
    async fn test_always_call_skips_decision() {
        let invoker = Arc::new(RecordingInvoker::succeeding("result"));
        let (pipeline, backend) = pipeline(
            vec![Ok("formatted".into())],
            &["search", "weather"],
            invoker.clone(),
        );
        let pipeline = pipeline.with_mode(PipelineMode::AlwaysCall);
        let mut log = RunLog::new();

        let reply = pipeline.run(request(&[], "anything"), &mut log).await;

        assert_eq!(reply, "formatted");
        assert_eq!(backend.call_count(), 1);
        assert_eq!(invoker.tools(), vec!["search".to_string()]);
    }

    #[tokio::test]
    async fn test_always_call_with_empty_registry_answers_directly() {
        let invoker = Arc::new(RecordingInvoker::succeeding("unused"));
        let (pipeline, backend) = pipeline(vec![Ok("direct".into())], &[], invoker.clone());
        let pipeline = pipeline.with_mode(PipelineMode::AlwaysCall);
        let mut log = RunLog::new();

        assert_eq!(pipeline.run(request(&[], "hi"), &mut log).await, "direct");
        assert_eq!(backend.call_count(), 1);
        assert_eq!(invoker.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_credential_still_replies() {
        let invoker = Arc::new(RecordingInvoker::succeeding("unused"));
        let (pipeline, backend) = pipeline(vec![], &["weather"], invoker.clone());
        let mut log = RunLog::new();

        let reply = pipeline
            .run(
                RunRequest {
                    history: &[],
                    message: "weather?",
                    credential: None,
                },
                &mut log,
            )
            .await;

        assert_eq!(reply, FORMAT_APOLOGY);
        assert_eq!(backend.call_count(), 0);
        assert_eq!(invoker.call_count(), 0);
        assert!(log.contains("No API key supplied"));
        assert!(log.contains("API key configured"));
    }

    #[tokio::test]
    async fn test_history_reaches_prompts() {
        let invoker = Arc::new(RecordingInvoker::succeeding("unused"));
        let (pipeline, backend) = pipeline(
            vec![Ok(r#"{"needsTool": false}"#.into()), Ok("Sure.".into())],
            &[],
            invoker,
        );
        let history = vec![ChatTurn::user("my name is Ada"), ChatTurn::assistant("Hi Ada!")];
        let mut log = RunLog::new();

        pipeline.run(request(&history, "what's my name?"), &mut log).await;

        assert!(log.contains("2 previous turn(s): 1 user, 1 assistant"));
        assert!(!log.contains("No API key supplied"));
        assert!(backend.prompt(0).contains("User: my name is Ada"));
        assert!(backend.prompt(1).contains("Assistant: Hi Ada!"));
    }

    #[test]
    fn test_error_apology_text() {
        assert_eq!(
            error_apology("boom"),
            "I'm sorry, I encountered an error: boom"
        );
    }

    #[test]
    fn test_advance_rejects_skipping_decision() {
        let mut log = RunLog::new();
        let err = advance(PipelineState::Start, PipelineState::Formatting, &mut log).unwrap_err();
        assert!(matches!(err, PipelineError::Internal { .. }));
        assert!(log.is_empty());
    }

    #[test]
    fn test_from_settings_without_tool_config() {
        let pipeline = Pipeline::from_settings(PipelineSettings::default()).unwrap();
        assert!(matches!(pipeline.tool_source(), ToolConfigSource::Static(r) if r.is_empty()));
    }

    #[test]
    fn test_from_settings_rejects_invalid() {
        let settings = PipelineSettings {
            model: " ".into(),
            ..PipelineSettings::default()
        };
        let err = Pipeline::from_settings(settings).err().unwrap();
        assert!(matches!(err, PipelineError::Inference(InferenceError::Config { .. })));
    }
}
