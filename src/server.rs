//! HTTP service exposing the pipeline's collaborator contracts.
//!
//! Serves the API routes the ingestion client and browser front end talk
//! to:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/process-file` | Remote extraction contract (docx/pdf/OCR and text formats) |
//! | `POST` | `/api/generate-insight` | Generate one insight from a note + collection |
//! | `POST` | `/api/chat` | Context-primed chat completion |
//! | `GET`  | `/api/check-config` | Credential / database configuration report |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Error bodies are JSON: `{ "error": "...", ... }` with `message`
//! (process-file) or `details` (insight/chat) carrying the human-readable
//! cause.
//!
//! CORS permits all origins, methods, and headers to support browser-based
//! clients.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::doctext;
use crate::extract::{self, FileFormat};
use crate::insight;
use crate::llm::{self, ChatService, LlmError};
use crate::models::{ChatMessage, ExtractionResult, Note, NoteType, Priority};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

/// Start the HTTP service on `[server].bind`. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Base64 inflates uploads by ~4/3; leave headroom over the raw limit.
    let body_limit = config.extraction.max_file_bytes * 2;

    let app = Router::new()
        .route("/api/process-file", post(handle_process_file))
        .route("/api/generate-insight", post(handle_generate_insight))
        .route("/api/chat", post(handle_chat))
        .route("/api/check-config", get(handle_check_config))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state);

    println!("NoteFlow service listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// Error that converts into a `{ "error": ... }` response body.
struct AppError {
    status: StatusCode,
    body: serde_json::Value,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        body: serde_json::json!({ "error": message.into() }),
    }
}

fn missing_credential_error() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: serde_json::json!({
            "error": "OpenAI API key not configured",
            "details": format!("Please set {} in your environment variables", llm::API_KEY_ENV),
        }),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/process-file ============

async fn handle_process_file(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let file_data = body.get("fileData").and_then(|v| v.as_str());
    let file_name = body.get("fileName").and_then(|v| v.as_str());

    let (file_data, file_name) = match (file_data, file_name) {
        (Some(data), Some(name)) if !name.is_empty() => (data, name.to_string()),
        _ => return Err(bad_request("Missing required fields (fileData or fileName)")),
    };

    let bytes = BASE64
        .decode(file_data)
        .map_err(|_| bad_request("Invalid base64 data"))?;

    if bytes.len() > state.config.extraction.max_file_bytes {
        return Err(bad_request(format!(
            "File exceeds the {} byte upload limit",
            state.config.extraction.max_file_bytes
        )));
    }

    let format = FileFormat::from_name(&file_name)
        .map_err(|_| bad_request(format!("Unsupported file type: {}", file_name)))?;

    let extracted = match format {
        FileFormat::Txt | FileFormat::Csv | FileFormat::Json => {
            extract::extract_local(format, &file_name, &bytes).map_err(process_file_error)?
        }
        FileFormat::Pdf => binary_result(format, &file_name, doctext::pdf_text(&bytes))?,
        FileFormat::Docx => binary_result(format, &file_name, doctext::docx_text(&bytes))?,
        FileFormat::Jpg | FileFormat::Jpeg | FileFormat::Png => {
            let extension = file_name.rsplit('.').next().unwrap_or("png");
            binary_result(
                format,
                &file_name,
                doctext::image_text(&state.config.extraction, &bytes, extension).await,
            )?
        }
    };

    let result = ExtractionResult {
        title: extracted.title,
        content: extract::finalize_content(extracted.content),
        source: extracted.source,
    };

    Ok(Json(serde_json::json!({
        "success": true,
        "result": result,
    })))
}

fn binary_result(
    format: FileFormat,
    file_name: &str,
    text: Result<String, doctext::DocTextError>,
) -> Result<ExtractionResult, AppError> {
    let content = text.map_err(|e| AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: serde_json::json!({
            "error": "Failed to process file",
            "message": e.to_string(),
        }),
    })?;

    Ok(ExtractionResult {
        title: extract::title_from_name(file_name),
        content,
        source: format.source_label().to_string(),
    })
}

fn process_file_error(e: extract::ExtractError) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: serde_json::json!({
            "error": "Failed to process file",
            "message": e.to_string(),
        }),
    }
}

// ============ POST /api/generate-insight ============

async fn handle_generate_insight(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let context = match body.get("context") {
        Some(value) if !value.is_null() => value,
        _ => return Err(bad_request("Missing required field: context")),
    };

    let service = build_service(&state.config)?;
    let note = note_from_loose(context);
    let collection = body
        .get("userContexts")
        .map(notes_from_loose)
        .unwrap_or_default();

    let request = insight::build_request(&note, &collection);
    let content = service.complete(&request).await.map_err(|err| AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: serde_json::json!({
            "error": "Failed to generate insight",
            "details": err.to_string(),
        }),
    })?;

    // Unparseable content degrades inside the route, exactly like the
    // client-side orchestrator.
    let draft = insight::parse_insight(&content)
        .unwrap_or_else(|| insight::degraded_insight(&note, content));

    Ok(Json(serde_json::json!({
        "insight": {
            "type": draft.insight_type.as_str(),
            "title": draft.title,
            "message": draft.message,
            "actionable": draft.actionable,
            "timestamp": "Just now",
        }
    })))
}

// ============ POST /api/chat ============

async fn handle_chat(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let messages: Vec<ChatMessage> = match body.get("messages") {
        Some(value) if value.is_array() => serde_json::from_value(value.clone())
            .map_err(|_| bad_request("Missing or invalid field: messages must be an array"))?,
        _ => return Err(bad_request("Missing or invalid field: messages must be an array")),
    };

    let service = build_service(&state.config)?;
    let collection = body
        .get("userContexts")
        .map(notes_from_loose)
        .unwrap_or_default();

    let reply = crate::chat::send_message(service.as_ref(), &messages, &collection)
        .await
        .map_err(|err| AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: serde_json::json!({
                "error": "Failed to process chat message",
                "details": err.detail,
            }),
        })?;

    Ok(Json(serde_json::json!({ "message": reply.content })))
}

// ============ GET /api/check-config ============

/// Configuration report shared by the route and `nf check`.
pub fn config_status(config: &Config) -> serde_json::Value {
    let key = std::env::var(llm::API_KEY_ENV).ok();
    let has_key = key.is_some();
    let key_preview = key
        .map(|k| format!("{}...", k.chars().take(8).collect::<String>()))
        .unwrap_or_else(|| "NOT SET".to_string());

    let llm_ready = !config.llm.is_enabled() || has_key;

    let mut details = serde_json::json!({
        "provider": config.llm.provider,
        "model": config.llm.model,
        "db": config.db.path.display().to_string(),
        "extraction_endpoint": config.extraction.endpoint,
    });
    details[llm::API_KEY_ENV] =
        serde_json::json!({ "present": has_key, "preview": key_preview });

    serde_json::json!({
        "configured": llm_ready,
        "details": details,
        "message": if llm_ready {
            "NoteFlow is configured correctly!"
        } else {
            "The language-model credential is missing. Add it to your environment \
             or set llm.provider = \"disabled\"."
        },
    })
}

async fn handle_check_config(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(config_status(&state.config))
}

// ============ Helpers ============

/// Build the per-request chat service, mapping a missing credential to the
/// configuration-error body.
fn build_service(config: &Arc<Config>) -> Result<Box<dyn ChatService>, AppError> {
    if !config.llm.is_enabled() {
        return Ok(Box::new(llm::DisabledChat));
    }
    match llm::OpenAiChat::new(&config.llm) {
        Ok(service) => Ok(Box::new(service)),
        Err(LlmError::MissingCredential) => Err(missing_credential_error()),
        Err(err) => Err(AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: serde_json::json!({
                "error": "Failed to initialize chat service",
                "details": err.to_string(),
            }),
        }),
    }
}

/// Build a note from a loose JSON object, applying the lenient defaults.
/// Routes accept partial objects from browser clients.
fn note_from_loose(value: &serde_json::Value) -> Note {
    let text = |key: &str| -> String {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };

    let now = Utc::now();
    let mut note = Note {
        id: text("id"),
        owner_id: String::new(),
        title: text("title"),
        summary: if value.get("summary").is_some() {
            text("summary")
        } else {
            text("description")
        },
        note_type: NoteType::parse_lenient(&text("type")),
        priority: Priority::parse_lenient(&text("priority")),
        connections: value
            .get("connections")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default(),
        created_at: now,
        updated_at: now,
        metadata: None,
    };
    if note.title.is_empty() {
        note.title = "Untitled".to_string();
    }
    note
}

fn notes_from_loose(value: &serde_json::Value) -> Vec<Note> {
    value
        .as_array()
        .map(|items| items.iter().map(note_from_loose).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_note_fills_defaults() {
        let note = note_from_loose(&serde_json::json!({
            "title": "From the browser",
            "priority": "urgent",
        }));
        assert_eq!(note.title, "From the browser");
        assert_eq!(note.priority, Priority::Medium);
        assert_eq!(note.note_type, NoteType::Custom);
    }

    #[test]
    fn loose_note_accepts_description_alias() {
        let note = note_from_loose(&serde_json::json!({
            "title": "General",
            "description": "System analysis",
        }));
        assert_eq!(note.summary, "System analysis");
    }

    #[test]
    fn loose_collection_ignores_non_arrays() {
        assert!(notes_from_loose(&serde_json::json!("nope")).is_empty());
        assert_eq!(
            notes_from_loose(&serde_json::json!([{ "title": "a" }, { "title": "b" }])).len(),
            2
        );
    }

    #[test]
    fn config_status_reflects_disabled_provider() {
        let config = Config {
            db: crate::config::DbConfig {
                path: "data/test.sqlite".into(),
            },
            user: Default::default(),
            llm: crate::config::LlmConfig {
                provider: "disabled".to_string(),
                ..Default::default()
            },
            extraction: Default::default(),
            server: Default::default(),
        };
        let status = config_status(&config);
        assert_eq!(status["configured"], serde_json::json!(true));
    }
}
