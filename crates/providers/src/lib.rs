//! # Hearth Providers
//!
//! Implementations of the `hearth-core` collaborator traits against the
//! concrete services Hearth talks to:
//!
//! - [`OllamaClient`] — text and vision generation via Ollama `/api/generate`
//! - [`SearxClient`] — web search via a SearxNG JSON endpoint
//! - [`ComfyClient`] — image generation via a ComfyUI server

pub mod comfy;
pub mod ollama;
pub mod searx;

pub use comfy::{ComfyClient, ComfyModels};
pub use ollama::OllamaClient;
pub use searx::SearxClient;
