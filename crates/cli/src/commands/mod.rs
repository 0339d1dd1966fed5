pub mod chat;
pub mod gateway;
pub mod memory;
pub mod personas;

use anyhow::Context;
use hearth_config::AppConfig;
use hearth_core::Persona;

/// Load the application config from the default location.
pub fn load_config() -> anyhow::Result<AppConfig> {
    AppConfig::load().context("Failed to load configuration")
}

/// Resolve a persona by id, falling back to the first available one.
pub fn resolve_persona(config: &AppConfig, persona_id: Option<&str>) -> anyhow::Result<Persona> {
    let id = match persona_id {
        Some(id) => id.to_string(),
        None => hearth_config::default_persona_id(&config.personas_dir),
    };
    hearth_config::load_persona(&config.personas_dir, &id, &config.models).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown persona '{id}' (looked in {})",
            config.personas_dir.display()
        )
    })
}
