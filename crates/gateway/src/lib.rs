//! # Hearth Gateway
//!
//! HTTP API over the turn orchestrator:
//!
//! - `GET  /personas`                          — list personas
//! - `GET  /memory/recent?persona_id=...`      — recent memory entries
//! - `POST /memory/delete`                     — delete one entry (cascades artifacts)
//! - `POST /memory/clear`                      — wipe a persona's memory
//! - `POST /chat`                              — one-shot answer
//! - `POST /chat/stream`                       — SSE stream of turn events
//! - `GET  /personas/{id}/images/{filename}`   — serve a generated image

pub mod routes;

use hearth_agent::{GateTemplates, TurnConfig, TurnRunner};
use hearth_config::AppConfig;
use hearth_core::{ImageRenderer, Inference, SearchProvider};
use hearth_memory::StoreLimits;
use hearth_providers::{ComfyClient, ComfyModels, OllamaClient, SearxClient};
use std::sync::Arc;
use tracing::info;

/// Shared state for all routes.
pub struct AppState {
    pub config: AppConfig,
    pub inference: Arc<dyn Inference>,
    pub runner: TurnRunner,
}

pub type SharedState = Arc<AppState>;

/// Memory caps from the application config.
pub fn store_limits(config: &AppConfig) -> StoreLimits {
    StoreLimits {
        max_file_chars: config.memory.max_file_chars,
        max_item_chars: config.memory.max_item_chars,
        max_image_context_chars: config.memory.max_image_context_chars,
        max_sources: config.memory.max_sources,
        max_source_url_chars: config.memory.max_source_url_chars,
    }
}

impl AppState {
    /// Wire up the collaborators described by `config`.
    pub fn from_config(config: AppConfig) -> Self {
        let inference: Arc<dyn Inference> = Arc::new(
            OllamaClient::new(&config.ollama.url)
                .without_thinking(config.ollama.thinking_disabled.clone()),
        );
        let search: Option<Arc<dyn SearchProvider>> = config
            .search
            .url
            .as_ref()
            .map(|url| Arc::new(SearxClient::new(url)) as Arc<dyn SearchProvider>);
        let renderer: Arc<dyn ImageRenderer> = Arc::new(ComfyClient::new(
            &config.comfy.url,
            ComfyModels {
                diffusion: config.comfy.diffusion_model.clone(),
                clip: config.comfy.clip_model.clone(),
                vae: config.comfy.vae_model.clone(),
            },
        ));

        let runner = TurnRunner::new(
            inference.clone(),
            search,
            renderer,
            TurnConfig {
                personas_root: config.personas_dir.clone(),
                limits: store_limits(&config),
                templates: GateTemplates::default(),
            },
        );

        Self {
            config,
            inference,
            runner,
        }
    }
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: SharedState, host: &str, port: u16) -> std::io::Result<()> {
    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!("Gateway listening on http://{host}:{port}");
    axum::serve(listener, app).await
}
