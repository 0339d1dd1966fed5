//! Configuration loading and validation for Hearth.
//!
//! Loads application settings from `hearth.toml` (path overridable) with
//! environment variable overrides for service URLs. Persona definitions are
//! separate JSON files discovered under the personas directory; see
//! [`persona`].

pub mod persona;

pub use persona::{default_persona_id, list_personas, load_persona, PersonaSummary};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `hearth.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding per-persona folders.
    #[serde(default = "default_personas_dir")]
    pub personas_dir: PathBuf,

    /// Ollama settings
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Web search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// ComfyUI settings
    #[serde(default)]
    pub comfy: ComfyConfig,

    /// Fallbacks for personas that omit model names
    #[serde(default)]
    pub models: ModelDefaults,

    /// Memory size caps
    #[serde(default)]
    pub memory: MemoryConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_personas_dir() -> PathBuf {
    PathBuf::from(".personas")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,

    /// Models that reject the `think` request option.
    #[serde(default)]
    pub thinking_disabled: Vec<String>,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".into()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            thinking_disabled: vec![],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    /// SearxNG base URL. Web search is disabled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComfyConfig {
    #[serde(default = "default_comfy_url")]
    pub url: String,

    #[serde(default = "default_diffusion_model")]
    pub diffusion_model: String,

    #[serde(default = "default_clip_model")]
    pub clip_model: String,

    #[serde(default = "default_vae_model")]
    pub vae_model: String,
}

fn default_comfy_url() -> String {
    "http://127.0.0.1:8188".into()
}
fn default_diffusion_model() -> String {
    "z-image-turbo-fp8-e4m3fn.safetensors".into()
}
fn default_clip_model() -> String {
    "qwen_3_4b.safetensors".into()
}
fn default_vae_model() -> String {
    "ae.safetensors".into()
}

impl Default for ComfyConfig {
    fn default() -> Self {
        Self {
            url: default_comfy_url(),
            diffusion_model: default_diffusion_model(),
            clip_model: default_clip_model(),
            vae_model: default_vae_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefaults {
    #[serde(default = "default_decision_model")]
    pub decision: String,

    #[serde(default = "default_main_model")]
    pub main: String,

    #[serde(default = "default_vision_model")]
    pub vision: String,

    #[serde(default = "default_persona_name")]
    pub persona_name: String,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_decision_model() -> String {
    "qwen3:0.6b".into()
}
fn default_main_model() -> String {
    "qwen3:4b".into()
}
fn default_vision_model() -> String {
    "qwen3-vl:4b".into()
}
fn default_persona_name() -> String {
    "Assistant".into()
}
fn default_system_prompt() -> String {
    "You are a helpful AI assistant. You remain accurate, concise, and calm.".into()
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self {
            decision: default_decision_model(),
            main: default_main_model(),
            vision: default_vision_model(),
            persona_name: default_persona_name(),
            system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_max_file_chars")]
    pub max_file_chars: usize,

    #[serde(default = "default_max_item_chars")]
    pub max_item_chars: usize,

    #[serde(default = "default_max_image_context_chars")]
    pub max_image_context_chars: usize,

    #[serde(default = "default_max_sources")]
    pub max_sources: usize,

    #[serde(default = "default_max_source_url_chars")]
    pub max_source_url_chars: usize,
}

fn default_max_file_chars() -> usize {
    50_000
}
fn default_max_item_chars() -> usize {
    1_000
}
fn default_max_image_context_chars() -> usize {
    2_000
}
fn default_max_sources() -> usize {
    20
}
fn default_max_source_url_chars() -> usize {
    500
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_file_chars: default_max_file_chars(),
            max_item_chars: default_max_item_chars(),
            max_image_context_chars: default_max_image_context_chars(),
            max_sources: default_max_sources(),
            max_source_url_chars: default_max_source_url_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8787
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (`./hearth.toml`).
    ///
    /// Service URLs can be overridden via `HEARTH_OLLAMA_URL`,
    /// `HEARTH_SEARCH_URL`, and `HEARTH_COMFYUI_URL`.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(Path::new("hearth.toml"))?;

        if let Ok(url) = std::env::var("HEARTH_OLLAMA_URL") {
            config.ollama.url = url;
        }
        if let Ok(url) = std::env::var("HEARTH_SEARCH_URL") {
            config.search.url = Some(url);
        }
        if let Ok(url) = std::env::var("HEARTH_COMFYUI_URL") {
            config.comfy.url = url;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.memory.max_item_chars < 4 {
            return Err(ConfigError::ValidationError(
                "memory.max_item_chars must be at least 4".into(),
            ));
        }
        if self.memory.max_file_chars == 0 {
            return Err(ConfigError::ValidationError(
                "memory.max_file_chars must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            personas_dir: default_personas_dir(),
            ollama: OllamaConfig::default(),
            search: SearchConfig::default(),
            comfy: ComfyConfig::default(),
            models: ModelDefaults::default(),
            memory: MemoryConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
