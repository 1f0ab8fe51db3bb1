//! Inference Client — OpenAI-compatible chat-completion client.
//!
//! This module handles all communication with the model endpoint:
//! - One non-streaming chat completion per call, bearer-authenticated
//! - Structured-output recovery from free-form model text
//! - Pipeline settings loading from `chatpipe.yaml`
//!
//! The HTTP transport sits behind [`ChatBackend`], so the pipeline can run
//! against any OpenAI-compatible endpoint or a scripted stub.

pub mod client;
pub mod config;
pub mod errors;
pub mod response_parser;
pub mod types;

// Re-exports for convenience
pub use client::{ChatBackend, ModelClient, OpenAiBackend};
pub use config::{PipelineMode, PipelineSettings};
pub use errors::InferenceError;
pub use types::{ChatMessage, Completion, ResponseMode, Role};
