//! Scripted backends and invokers shared by unit tests.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::inference::client::{ChatBackend, STRUCTURED_SYSTEM_PROMPT};
use crate::inference::types::ChatCompletionRequest;
use crate::inference::InferenceError;
use crate::mcp_client::{InvocationContext, InvokeError, ToolConfig, ToolInvoker, ToolRegistry};

/// Returns queued responses in order and records every request.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, InferenceError>>>,
    requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<String, InferenceError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// User-role prompt of the `index`-th request.
    pub fn prompt(&self, index: usize) -> String {
        self.requests.lock().unwrap()[index].messages[1].content.clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn send(
        &self,
        _api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<String, InferenceError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(InferenceError::InvalidResponse {
                    reason: "script exhausted".into(),
                })
            })
    }
}

/// Pure function of the request: identical requests give identical answers.
///
/// Structured asks get `structured_reply`; natural asks get a hash of the prompt.
pub struct DeterministicBackend {
    pub structured_reply: String,
}

#[async_trait]
impl ChatBackend for DeterministicBackend {
    async fn send(
        &self,
        _api_key: &str,
        request: &ChatCompletionRequest,
    ) -> Result<String, InferenceError> {
        if request.messages[0].content == STRUCTURED_SYSTEM_PROMPT {
            return Ok(self.structured_reply.clone());
        }
        let mut hasher = DefaultHasher::new();
        request.messages[1].content.hash(&mut hasher);
        Ok(format!("reply-{:016x}", hasher.finish()))
    }
}

/// Invoker that records calls and returns a fixed outcome.
pub struct RecordingInvoker {
    outcome: Result<String, String>,
    calls: AtomicUsize,
    tools: Mutex<Vec<String>>,
}

impl RecordingInvoker {
    pub fn succeeding(result: &str) -> Self {
        Self {
            outcome: Ok(result.to_string()),
            calls: AtomicUsize::new(0),
            tools: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
            tools: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn tools(&self) -> Vec<String> {
        self.tools.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolInvoker for RecordingInvoker {
    async fn invoke(
        &self,
        tool: &ToolConfig,
        _ctx: InvocationContext<'_>,
    ) -> Result<String, InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tools.lock().unwrap().push(tool.name.clone());
        self.outcome.clone().map_err(|reason| InvokeError::Failed {
            tool: tool.name.clone(),
            reason,
        })
    }
}

/// Registry with one bare server per name, in the given order.
pub fn registry_of(names: &[&str]) -> ToolRegistry {
    ToolRegistry::from_configs(
        names
            .iter()
            .map(|name| ToolConfig {
                name: name.to_string(),
                description: format!("The {name} server"),
                commands: Vec::new(),
            })
            .collect(),
    )
    .unwrap()
}
