//! HTTP handlers for the chat backend.

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::AgentRuntime;
use crate::error::Error;
use crate::files::{self, FileEntry};
use crate::stream::{run_task, stream_task, StreamEvent};
use crate::Result;
use super::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub files: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub files_generated: bool,
}

/// Per-file result of an upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResult {
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub status: String,
    pub cleared: usize,
    pub files: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub path: String,
}

fn runtime(state: &AppState) -> Result<Arc<AgentRuntime>> {
    state
        .runtime
        .clone()
        .ok_or_else(|| Error::Unavailable("Agent not initialized".to_string()))
}

/// GET /api/status
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let response = match &state.runtime {
        Some(_) => StatusResponse {
            status: "ready".to_string(),
            message: Some("Agent is ready".to_string()),
        },
        None => StatusResponse {
            status: "error".to_string(),
            message: Some("Agent not initialized".to_string()),
        },
    };
    Json(response)
}

/// POST /api/chat
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let runtime = runtime(&state)?;
    let files = request.files.unwrap_or_default();
    let task = task_with_files(&request.message, &files);

    let summary = run_task(&runtime, &task, false).await?;
    let totals = summary.tally.totals();

    Ok(Json(ChatResponse {
        response: summary.answer.as_text(),
        input_tokens: totals.map(|(input, _)| input),
        output_tokens: totals.map(|(_, output)| output),
        files_generated: summary.files_generated,
    }))
}

/// POST /api/stream: NDJSON events, one object per line.
pub async fn stream_handler(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let events = start_stream(&state, multipart).await?;
    let body = Body::from_stream(events.map(|event| event.to_line()));

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}

/// POST /api/stream/sse: the same events with SSE framing.
pub async fn stream_sse_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let events = start_stream(&state, multipart).await?;

    let stream = events.map(|event| {
        let sse = match event.to_json() {
            Ok(json) => Event::default().event("message").data(json),
            Err(e) => Event::default().event("error").data(e.to_string()),
        };
        Ok::<_, Infallible>(sse)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn start_stream(state: &AppState, multipart: Multipart) -> Result<ReceiverStream<StreamEvent>> {
    let runtime = runtime(state)?;
    let (message, paths) = read_task_form(state, multipart).await?;
    let task = task_with_files(&message, &paths);

    let run_id = Uuid::new_v4();
    info!(%run_id, files = paths.len(), "Streaming agent run");

    Ok(ReceiverStream::new(stream_task(runtime, task, false)))
}

/// Read the `message` field and store any attached files.
async fn read_task_form(state: &AppState, mut multipart: Multipart) -> Result<(String, Vec<String>)> {
    let mut message = None;
    let mut paths = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);

        match (name.as_str(), file_name) {
            ("message", _) => {
                message = Some(field.text().await.map_err(|e| Error::BadRequest(e.to_string()))?);
            }
            (_, Some(file_name)) if !file_name.is_empty() => {
                let bytes = field.bytes().await.map_err(|e| Error::Upload(e.to_string()))?;
                let saved = files::save_upload(&state.config.upload_dir, &file_name, &bytes).await?;
                paths.push(saved.path);
            }
            _ => {}
        }
    }

    let message = message.ok_or_else(|| Error::BadRequest("Missing 'message' field".to_string()))?;
    Ok((message, paths))
}

/// Append the list of provided files to a task.
pub fn task_with_files(message: &str, paths: &[String]) -> String {
    if paths.is_empty() {
        return message.to_string();
    }
    let listed: Vec<String> = paths.iter().map(|p| format!("'{}'", p)).collect();
    format!(
        "{}\n\nYou have been provided with these files, which might be helpful or not: [{}]",
        message,
        listed.join(", ")
    )
}

/// POST /api/upload
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<UploadResult>>> {
    let mut results = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::BadRequest(e.to_string()))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        let saved = match field.bytes().await {
            Ok(bytes) => files::save_upload(&state.config.upload_dir, &filename, &bytes).await,
            Err(e) => Err(Error::Upload(e.to_string())),
        };

        results.push(match saved {
            Ok(saved) => UploadResult {
                filename,
                path: Some(saved.path),
                size: Some(saved.size),
                error: None,
                status: "success".to_string(),
            },
            Err(e) => {
                warn!("Upload of {} failed: {}", filename, e);
                UploadResult {
                    filename,
                    path: None,
                    size: None,
                    error: Some(e.to_string()),
                    status: "error".to_string(),
                }
            }
        });
    }

    Ok(Json(results))
}

/// POST /api/reset
pub async fn reset_handler(State(state): State<AppState>) -> Result<Json<ActionResponse>> {
    runtime(&state)?.reset().await;
    Ok(Json(ActionResponse {
        status: "success".to_string(),
        message: "Conversation history reset".to_string(),
    }))
}

/// GET /api/files
pub async fn files_handler(State(state): State<AppState>) -> Result<Json<Vec<FileEntry>>> {
    let dirs = state.config.file_dirs();
    let entries = tokio::task::spawn_blocking(move || files::list_files(&dirs))
        .await
        .map_err(|e| Error::Other(e.to_string()))?;
    Ok(Json(entries))
}

/// POST /api/files/clear
pub async fn clear_files_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    let dirs = vec![state.config.output_dir.clone()];
    let cleared: Vec<PathBuf> = tokio::task::spawn_blocking(move || files::clear_dirs(&dirs))
        .await
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(Json(ClearResponse {
        status: "success".to_string(),
        cleared: cleared.len(),
        files: cleared.iter().map(|p| p.display().to_string()).collect(),
    }))
}

/// GET /download?path=
pub async fn download_handler(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response> {
    let path = files::resolve_download(&state.config.file_dirs(), &query.path)?;
    let bytes = tokio::fs::read(&path).await?;

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());

    Ok((
        [
            (header::CONTENT_TYPE, mime.essence_str().to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", name)),
        ],
        bytes,
    )
        .into_response())
}
