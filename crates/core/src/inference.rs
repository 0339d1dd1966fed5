//! Inference collaborator trait.
//!
//! Implemented by `hearth-providers` against an Ollama-style HTTP API.
//! Streaming responses are delivered over an mpsc channel so the orchestrator
//! can forward fragments to clients as they arrive.

use crate::error::InferenceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One generation request: a fully assembled prompt plus model selection.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    /// Model identifier, e.g. `qwen3:4b`.
    pub model: String,

    /// The complete prompt text (system + memory + context + question).
    pub prompt: String,

    /// Base64-encoded images, no data-URL prefix. Empty for text-only turns.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,

    /// Request separated reasoning output from models that support it.
    pub think: bool,
}

impl GenerateRequest {
    /// Text-only request with thinking disabled.
    pub fn text(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            images: Vec::new(),
            think: false,
        }
    }
}

/// One fragment of a streamed generation.
///
/// Fragments carry reasoning text, answer text, or both; `done` marks the
/// final fragment of the stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamFragment {
    /// Reasoning text, present only when the model emits separated thinking.
    #[serde(default)]
    pub thinking: Option<String>,

    /// Answer text.
    #[serde(default)]
    pub response: Option<String>,

    /// True on the final fragment.
    #[serde(default)]
    pub done: bool,
}

/// A text/vision generation backend.
#[async_trait]
pub trait Inference: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Run a request to completion and return the trimmed response text.
    async fn generate(&self, request: GenerateRequest) -> Result<String, InferenceError>;

    /// Run a request and stream fragments as they arrive.
    ///
    /// The channel closes after the `done` fragment, or after an error item
    /// when the stream is interrupted.
    async fn stream(
        &self,
        request: GenerateRequest,
    ) -> Result<mpsc::Receiver<Result<StreamFragment, InferenceError>>, InferenceError>;
}
