//! Persona domain types.
//!
//! A persona is a named configuration bundle: its own system prompt, model
//! identifiers, decision toggles, and memory file. Personas are loaded by
//! `hearth-config` and are immutable for the duration of a turn.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-persona toggles for LLM-based decisions (each runs at most once per
/// turn). Missing keys default to enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionToggles {
    /// Allow the turn to branch into image generation.
    #[serde(default = "default_true")]
    pub image_generation: bool,

    /// Allow the turn to run a web search.
    #[serde(default = "default_true")]
    pub web_search: bool,

    /// Allow past image annotations to be pulled into the prompt.
    #[serde(default = "default_true")]
    pub prior_image_context: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DecisionToggles {
    fn default() -> Self {
        Self {
            image_generation: true,
            web_search: true,
            prior_image_context: true,
        }
    }
}

/// A named configuration bundle for one conversational identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// Directory name under the personas root; also used in artifact URLs.
    pub id: String,

    /// Display name, used as the speaker label in prompts.
    pub name: String,

    /// System prompt text placed at the top of every assembled prompt.
    pub system_prompt: String,

    /// Model used for YES/NO decision classification.
    pub decision_model: String,

    /// Model used for main generation and image-prompt authoring.
    pub model: String,

    /// Vision model used when images are attached.
    pub vision_model: String,

    /// Path of this persona's memory JSON file.
    pub memory_path: PathBuf,

    /// Decision toggles.
    #[serde(default)]
    pub decisions: DecisionToggles,
}
