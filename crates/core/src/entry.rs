//! Memory entry domain types.
//!
//! A [`MemoryEntry`] is one message in a persona's short-term conversation
//! memory, persisted as part of `{ "entries": [...] }` in the persona's
//! memory file. The entry's timestamp doubles as its unique id.

use serde::{Deserialize, Serialize};

/// Who authored a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryRole {
    /// The end user
    User,
    /// The AI persona
    Assistant,
}

/// One message in short-term conversation memory.
///
/// `timestamp` is assigned by the store on append and is unique and
/// monotonically increasing within a store — it is the entry's id.
/// Assistant-only fields are dropped by the store when a user entry is
/// written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique id: RFC 3339 timestamp with microsecond precision.
    #[serde(default)]
    pub timestamp: String,

    /// Who authored this entry.
    pub role: EntryRole,

    /// The message text (capped by the store on write).
    #[serde(default)]
    pub content: String,

    /// Display name of the persona that answered (assistant only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_name: Option<String>,

    /// Text summary of images the user attached to this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_context: Option<String>,

    /// Web snippets used while answering. In-memory only; never persisted.
    #[serde(skip)]
    pub web_context: Option<String>,

    /// Source URLs from web search (assistant only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,

    /// URL path of a generated image, e.g. `/personas/<id>/images/x.png`
    /// (assistant only). Shown in the UI, never sent to the LLM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_image_path: Option<String>,

    /// The prompt used to generate the image (assistant only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_image_prompt: Option<String>,
}

impl MemoryEntry {
    /// Create a user entry for the given question text.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            timestamp: String::new(),
            role: EntryRole::User,
            content: content.into(),
            persona_name: None,
            image_context: None,
            web_context: None,
            sources: Vec::new(),
            generated_image_path: None,
            generated_image_prompt: None,
        }
    }

    /// Create an empty assistant entry attributed to the given persona.
    pub fn assistant(persona_name: impl Into<String>) -> Self {
        Self {
            timestamp: String::new(),
            role: EntryRole::Assistant,
            content: String::new(),
            persona_name: Some(persona_name.into()),
            image_context: None,
            web_context: None,
            sources: Vec::new(),
            generated_image_path: None,
            generated_image_prompt: None,
        }
    }

    /// The speaker label used when formatting this entry for a prompt:
    /// the persona's display name for assistant entries, "user" otherwise.
    pub fn speaker(&self) -> &str {
        match self.role {
            EntryRole::Assistant => self.persona_name.as_deref().unwrap_or("assistant"),
            EntryRole::User => "user",
        }
    }

    /// Format this entry for inclusion in an LLM prompt.
    ///
    /// Sources and the generated image path are UI-only and never appear.
    pub fn prompt_line(
        &self,
        include_image_context: bool,
        include_generated_image_prompt: bool,
    ) -> String {
        let mut line = format!("{}: {}", self.speaker(), self.content);
        if include_image_context
            && let Some(ctx) = &self.image_context
        {
            line.push_str(&format!("\n[past image memory: {ctx}]"));
        }
        if let Some(web) = &self.web_context {
            line.push_str(&format!("\n[web context: {web}]"));
        }
        if include_generated_image_prompt
            && let Some(prompt) = &self.generated_image_prompt
        {
            line.push_str(&format!("\n[generated image prompt: {prompt}]"));
        }
        line
    }
}

/// Format a slice of entries, oldest-first, one prompt line per entry.
pub fn prompt_lines(
    entries: &[MemoryEntry],
    include_image_context: bool,
    include_generated_image_prompt: bool,
) -> String {
    entries
        .iter()
        .map(|e| e.prompt_line(include_image_context, include_generated_image_prompt))
        .collect::<Vec<_>>()
        .join("\n")
}
