//! Image render collaborator trait.

use crate::error::RenderError;
use async_trait::async_trait;
use std::path::Path;

/// An image generation backend (ComfyUI or compatible).
///
/// Rendering is slow (tens of seconds to minutes); callers run it in a
/// background task and patch the originating memory entry on completion.
#[async_trait]
pub trait ImageRenderer: Send + Sync {
    /// Generate an image for `prompt` and write the PNG bytes to `output`.
    async fn render(&self, prompt: &str, output: &Path) -> Result<(), RenderError>;
}
