//! Route handlers.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::sse::{Event as SseEvent, Sse},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use hearth_agent::{describe_images, TurnRequest};
use hearth_config::{default_persona_id, list_personas, load_persona};
use hearth_core::{MemoryEntry, Persona};
use hearth_memory::{resolve_artifact, MemoryStore};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::{store_limits, SharedState};

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/personas", get(personas_list))
        .route("/personas/{persona_id}/images/{filename}", get(persona_image))
        .route("/memory/recent", get(memory_recent))
        .route("/memory/delete", post(memory_delete))
        .route("/memory/clear", post(memory_clear))
        .route("/chat", post(chat))
        .route("/chat/stream", post(chat_stream))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Shared plumbing ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn resolve_persona(state: &SharedState, persona_id: Option<&str>) -> Result<Persona, ApiError> {
    let dir = &state.config.personas_dir;
    let id = match persona_id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => default_persona_id(dir),
    };
    load_persona(dir, &id, &state.config.models)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("unknown persona: {id}")))
}

fn store_for(state: &SharedState, persona: &Persona) -> MemoryStore {
    MemoryStore::new(
        &persona.memory_path,
        &state.config.personas_dir,
        store_limits(&state.config),
    )
}

/// Accept base64 strings with or without a `data:image/...;base64,` prefix.
fn normalize_images(images: &[String]) -> Vec<String> {
    images
        .iter()
        .map(|img| match img.strip_prefix("data:") {
            Some(rest) => rest
                .split_once(',')
                .map(|(_, payload)| payload.to_string())
                .unwrap_or_else(|| img.clone()),
            None => img.clone(),
        })
        .collect()
}

const DEFAULT_IMAGE_QUESTION: &str = "What do you see in the image(s)?";

/// Validate a chat body and caption any attached images, returning the
/// turn request and the persona it targets.
async fn prepare_turn(
    state: &SharedState,
    body: ChatRequest,
) -> Result<(Persona, TurnRequest), ApiError> {
    let message = body.message.trim().to_string();
    let images = normalize_images(&body.images);
    if message.is_empty() && images.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "message or images required",
        ));
    }
    let persona = resolve_persona(state, body.persona_id.as_deref())?;

    // Caption before the stream starts so failures surface as plain errors
    // rather than a broken event stream.
    let image_context =
        describe_images(state.inference.as_ref(), &persona.vision_model, &images).await;

    let question = if message.is_empty() {
        DEFAULT_IMAGE_QUESTION.to_string()
    } else {
        message
    };
    Ok((
        persona,
        TurnRequest {
            question,
            extra_context: body.extra_context,
            images,
            image_context,
        },
    ))
}

// ── Personas ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PersonasQuery {
    #[serde(default)]
    public: Option<String>,
}

#[derive(Serialize)]
struct PersonaInfo {
    id: String,
    name: String,
    public: bool,
}

#[derive(Serialize)]
struct PersonasResponse {
    personas: Vec<PersonaInfo>,
    default: String,
}

async fn personas_list(
    State(state): State<SharedState>,
    Query(query): Query<PersonasQuery>,
) -> Json<PersonasResponse> {
    let public_only = query
        .public
        .as_deref()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(true);
    let dir = &state.config.personas_dir;
    let personas = list_personas(dir, public_only)
        .into_iter()
        .map(|p| PersonaInfo {
            id: p.id,
            name: p.name,
            public: p.public,
        })
        .collect();
    Json(PersonasResponse {
        personas,
        default: default_persona_id(dir),
    })
}

async fn persona_image(
    State(state): State<SharedState>,
    Path((persona_id, filename)): Path<(String, String)>,
) -> Response {
    let url = format!("/personas/{persona_id}/images/{filename}");
    let Some(path) = resolve_artifact(&state.config.personas_dir, &url) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

// ── Memory ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct MemoryQuery {
    #[serde(default)]
    persona_id: Option<String>,
}

#[derive(Serialize)]
struct MemoryResponse {
    entries: Vec<MemoryEntry>,
}

async fn memory_recent(
    State(state): State<SharedState>,
    Query(query): Query<MemoryQuery>,
) -> Result<Json<MemoryResponse>, ApiError> {
    let persona = resolve_persona(&state, query.persona_id.as_deref())?;
    let entries = store_for(&state, &persona)
        .load_all()
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(MemoryResponse { entries }))
}

#[derive(Deserialize)]
struct DeleteRequest {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    persona_id: Option<String>,
}

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

async fn memory_delete(
    State(state): State<SharedState>,
    Json(body): Json<DeleteRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let Some(timestamp) = body.timestamp.filter(|t| !t.is_empty()) else {
        return Err(api_error(StatusCode::BAD_REQUEST, "timestamp required"));
    };
    let persona = resolve_persona(&state, body.persona_id.as_deref())?;
    let deleted = store_for(&state, &persona)
        .delete(&timestamp)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if deleted {
        Ok(Json(OkResponse { ok: true }))
    } else {
        Err(api_error(StatusCode::NOT_FOUND, "entry not found"))
    }
}

#[derive(Deserialize)]
struct ClearRequest {
    #[serde(default)]
    persona_id: Option<String>,
}

async fn memory_clear(
    State(state): State<SharedState>,
    Json(body): Json<ClearRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let persona = resolve_persona(&state, body.persona_id.as_deref())?;
    store_for(&state, &persona)
        .clear()
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(OkResponse { ok: true }))
}

// ── Chat ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    persona_id: Option<String>,
    #[serde(default)]
    extra_context: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    sources: Vec<String>,
}

async fn chat(
    State(state): State<SharedState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let (persona, request) = prepare_turn(&state, body).await?;
    let (response, sources) = state.runner.answer(persona, request).await;
    Ok(Json(ChatResponse { response, sources }))
}

async fn chat_stream(
    State(state): State<SharedState>,
    Json(body): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let (persona, request) = prepare_turn(&state, body).await?;
    let rx = state.runner.stream(persona, request);
    let stream = ReceiverStream::new(rx).map(|event| {
        let event_type = event.event_type();
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(SseEvent::default().event(event_type).data(data))
    });
    Ok(Sse::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_data_url_prefix() {
        let images = vec![
            "data:image/png;base64,AAAA".to_string(),
            "BBBB".to_string(),
        ];
        assert_eq!(normalize_images(&images), vec!["AAAA", "BBBB"]);
    }

    #[test]
    fn normalize_keeps_malformed_data_url_untouched() {
        let images = vec!["data:image/png".to_string()];
        assert_eq!(normalize_images(&images), vec!["data:image/png"]);
    }

    #[test]
    fn chat_request_defaults() {
        let body: ChatRequest = serde_json::from_str(r#"{"message": "hi"}"#).unwrap();
        assert_eq!(body.message, "hi");
        assert!(body.images.is_empty());
        assert!(body.persona_id.is_none());
    }
}
