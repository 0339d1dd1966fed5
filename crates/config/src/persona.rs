//! Persona discovery and loading.
//!
//! Each persona lives in `<personas_dir>/<persona_id>/` with:
//!   - `<persona_id>.config` (JSON; a plain `config` file is also accepted)
//!   - `memory.json` (persona-specific conversation memory)
//!   - `images/` (generated images)
//!
//! Directories with a missing or unparseable config are skipped.

use crate::ModelDefaults;
use hearth_core::{DecisionToggles, Persona};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

const MEMORY_FILENAME: &str = "memory.json";
const FALLBACK_PERSONA_ID: &str = "assistant";

/// On-disk persona config. Every field is optional; [`ModelDefaults`] fills
/// the gaps.
#[derive(Debug, Deserialize)]
struct PersonaFile {
    #[serde(default)]
    name: Option<String>,
    /// Listed to unauthenticated clients when true.
    #[serde(default = "default_public")]
    public: bool,
    #[serde(default)]
    system_persona: Option<String>,
    #[serde(default)]
    decision_model: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    vl_model: Option<String>,
    #[serde(default)]
    decisions: Option<DecisionToggles>,
}

fn default_public() -> bool {
    true
}

/// A discovered persona, as returned by [`list_personas`].
#[derive(Debug, Clone)]
pub struct PersonaSummary {
    pub id: String,
    pub name: String,
    pub public: bool,
    pub memory_path: PathBuf,
}

fn config_path(dir: &Path, persona_id: &str) -> Option<PathBuf> {
    let named = dir.join(format!("{persona_id}.config"));
    if named.is_file() {
        return Some(named);
    }
    let plain = dir.join("config");
    plain.is_file().then_some(plain)
}

fn read_config(path: &Path) -> Option<PersonaFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(file) => Some(file),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping persona with invalid config");
            None
        }
    }
}

/// Discover personas under `personas_dir`, sorted by id.
pub fn list_personas(personas_dir: &Path, public_only: bool) -> Vec<PersonaSummary> {
    let Ok(children) = std::fs::read_dir(personas_dir) else {
        return Vec::new();
    };
    let mut result: Vec<PersonaSummary> = children
        .flatten()
        .filter_map(|child| {
            let dir = child.path();
            if !dir.is_dir() {
                return None;
            }
            let id = child.file_name().to_string_lossy().to_string();
            let config = read_config(&config_path(&dir, &id)?)?;
            if public_only && !config.public {
                return None;
            }
            Some(PersonaSummary {
                name: config.name.unwrap_or_else(|| id.clone()),
                public: config.public,
                memory_path: dir.join(MEMORY_FILENAME),
                id,
            })
        })
        .collect();
    result.sort_by(|a, b| a.id.cmp(&b.id));
    result
}

/// Load one persona by id, filling omitted fields from `defaults`.
/// Returns `None` when the persona does not exist or its config is invalid.
pub fn load_persona(
    personas_dir: &Path,
    persona_id: &str,
    defaults: &ModelDefaults,
) -> Option<Persona> {
    let dir = personas_dir.join(persona_id);
    let config = read_config(&config_path(&dir, persona_id)?)?;
    Some(Persona {
        id: persona_id.to_string(),
        name: config.name.unwrap_or_else(|| defaults.persona_name.clone()),
        system_prompt: config
            .system_persona
            .unwrap_or_else(|| defaults.system_prompt.clone()),
        decision_model: config
            .decision_model
            .unwrap_or_else(|| defaults.decision.clone()),
        model: config.model.unwrap_or_else(|| defaults.main.clone()),
        vision_model: config.vl_model.unwrap_or_else(|| defaults.vision.clone()),
        memory_path: dir.join(MEMORY_FILENAME),
        decisions: config.decisions.unwrap_or_default(),
    })
}

/// The first available persona id, or `"assistant"` when none exist.
pub fn default_persona_id(personas_dir: &Path) -> String {
    list_personas(personas_dir, false)
        .into_iter()
        .next()
        .map(|p| p.id)
        .unwrap_or_else(|| FALLBACK_PERSONA_ID.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_persona(root: &Path, id: &str, config: &str) {
        let dir = root.join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{id}.config")), config).unwrap();
    }

    #[test]
    fn lists_personas_sorted_by_id() {
        let root = TempDir::new().unwrap();
        write_persona(root.path(), "zoe", r#"{"name": "Zoe"}"#);
        write_persona(root.path(), "arlo", r#"{"name": "Arlo"}"#);

        let personas = list_personas(root.path(), false);
        assert_eq!(personas.len(), 2);
        assert_eq!(personas[0].id, "arlo");
        assert_eq!(personas[1].name, "Zoe");
    }

    #[test]
    fn public_only_filters_private_personas() {
        let root = TempDir::new().unwrap();
        write_persona(root.path(), "open", r#"{"name": "Open"}"#);
        write_persona(root.path(), "hidden", r#"{"name": "Hidden", "public": false}"#);

        let personas = list_personas(root.path(), true);
        assert_eq!(personas.len(), 1);
        assert_eq!(personas[0].id, "open");
    }

    #[test]
    fn invalid_configs_are_skipped() {
        let root = TempDir::new().unwrap();
        write_persona(root.path(), "good", r#"{"name": "Good"}"#);
        write_persona(root.path(), "broken", "{not json");
        std::fs::create_dir_all(root.path().join("no-config")).unwrap();

        let personas = list_personas(root.path(), false);
        assert_eq!(personas.len(), 1);
        assert_eq!(personas[0].id, "good");
    }

    #[test]
    fn plain_config_filename_is_accepted() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("sage");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config"), r#"{"name": "Sage"}"#).unwrap();

        assert_eq!(list_personas(root.path(), false).len(), 1);
        assert!(load_persona(root.path(), "sage", &ModelDefaults::default()).is_some());
    }

    #[test]
    fn load_persona_fills_defaults() {
        let root = TempDir::new().unwrap();
        write_persona(
            root.path(),
            "sage",
            r#"{"name": "Sage", "model": "llama3:8b", "decisions": {"web_search": false}}"#,
        );

        let persona = load_persona(root.path(), "sage", &ModelDefaults::default()).unwrap();
        assert_eq!(persona.name, "Sage");
        assert_eq!(persona.model, "llama3:8b");
        assert_eq!(persona.decision_model, "qwen3:0.6b");
        assert_eq!(persona.vision_model, "qwen3-vl:4b");
        assert!(!persona.decisions.web_search);
        assert!(persona.decisions.image_generation);
        assert!(persona.memory_path.ends_with("sage/memory.json"));
    }

    #[test]
    fn missing_persona_yields_none() {
        let root = TempDir::new().unwrap();
        assert!(load_persona(root.path(), "ghost", &ModelDefaults::default()).is_none());
    }

    #[test]
    fn default_persona_id_falls_back() {
        let root = TempDir::new().unwrap();
        assert_eq!(default_persona_id(root.path()), "assistant");
        write_persona(root.path(), "sage", r#"{"name": "Sage"}"#);
        assert_eq!(default_persona_id(root.path()), "sage");
    }
}
