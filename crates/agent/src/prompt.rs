//! Prompt assembly.
//!
//! A prompt is built from fixed blocks in a fixed order: system text,
//! conversation memory, caller-supplied context, web snippets, and finally
//! the question. Blocks are joined with single newlines; each optional
//! block carries its own trailing newline so spacing stays stable whether
//! or not it is present.

use hearth_core::entry::{prompt_lines, MemoryEntry};

/// System text used when the persona does not define one.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. You remain accurate, concise, and calm.";

/// System text for authoring an image generation prompt.
pub const IMAGE_PROMPT_SYSTEM: &str = "You help turn the user's request into a single, detailed image generation prompt suitable for Stable Diffusion / ComfyUI.
Use the conversation memory for context. Output ONLY the image prompt itself: no quotes, no explanation, no preamble. One paragraph, descriptive (style, subject, lighting, quality tags as appropriate).";

const WEB_INSTRUCTION: &str = "Use the following web information to answer the question. \
Base your answer on this information unless the prompt includes an image, then also use the image context.";

/// All inputs to one assembled prompt. Stages fill this in as the turn
/// progresses; [`PromptAssembly::build`] renders the final text.
#[derive(Debug, Clone)]
pub struct PromptAssembly {
    pub question: String,
    pub memory: Vec<MemoryEntry>,
    pub extra_context: Option<String>,
    pub system_prompt: Option<String>,
    pub web_context: Option<String>,
    pub sources: Vec<String>,
    /// Include `[past image memory: ...]` annotations from memory entries.
    pub include_memory_image_context: bool,
    /// Include `[generated image prompt: ...]` annotations.
    pub include_generated_image_prompt: bool,
}

impl PromptAssembly {
    pub fn new(question: impl Into<String>, memory: Vec<MemoryEntry>) -> Self {
        Self {
            question: question.into(),
            memory,
            extra_context: None,
            system_prompt: None,
            web_context: None,
            sources: Vec::new(),
            include_memory_image_context: true,
            include_generated_image_prompt: true,
        }
    }

    /// Render the full prompt text.
    pub fn build(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        parts.push(
            self.system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        );
        if !self.memory.is_empty() {
            parts.push(format!(
                "Conversation memory:\n{}\n",
                prompt_lines(
                    &self.memory,
                    self.include_memory_image_context,
                    self.include_generated_image_prompt,
                )
            ));
        }
        if let Some(extra) = &self.extra_context
            && !extra.is_empty()
        {
            parts.push(format!("Additional context:\n{extra}\n"));
        }
        if let Some(web) = &self.web_context {
            parts.push(format!("{WEB_INSTRUCTION}\n\nWeb information:\n{web}\n"));
        }
        parts.push(format!("Question:\n{}", self.question));
        parts.join("\n")
    }

    /// Memory rendered with every annotation included, for the image prompt
    /// authoring request.
    pub fn memory_context(&self) -> String {
        prompt_lines(&self.memory, true, true)
    }
}

/// Build the request that asks the LLM to author an image generation prompt.
pub fn image_prompt_request(memory_context: &str, question: &str) -> String {
    let mut parts: Vec<String> = vec![IMAGE_PROMPT_SYSTEM.to_string()];
    if !memory_context.is_empty() {
        parts.push(format!("Conversation memory:\n{memory_context}\n"));
    }
    parts.push(format!("User request:\n{question}"));
    parts.push("\nOutput only the image prompt (no other text):".to_string());
    parts.join("\n")
}
