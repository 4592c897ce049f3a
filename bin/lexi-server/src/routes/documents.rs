//! Document understanding endpoints: demystify, contextual chat, speech and
//! per-user activity history.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, FromRequest, Multipart, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use lexi_core::{Demystification, HistoryEntry};
use serde_json::json;
use tracing::info;
use utoipa::OpenApi;

use super::upload::UploadForm;
use crate::error::ServerError;
use crate::middleware::UserId;
use crate::schemas::{ChatRequest, ChatResponse, DocumentUpload, MessageResponse, TextRequest, non_blank};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(demystify, chat, clear_context, speak, history))]
pub struct DocumentsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/demystify", post(demystify))
        .route("/api/chat", post(chat))
        .route("/api/clear_context", post(clear_context))
        .route("/api/speak", post(speak))
        .route("/api/history", get(history))
}

/// Text of a request that carries either an uploaded `file`, a multipart
/// `text` field, or a JSON `{"text"}` body.
async fn document_text(request: Request, state: &Arc<AppState>) -> Result<Option<String>, ServerError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;
        let form = UploadForm::read(multipart).await?;
        match form.file_text().await? {
            Some(text) => Ok(Some(text)),
            None => Ok(non_blank(form.field("text").map(str::to_owned))),
        }
    } else {
        let body = Json::<TextRequest>::from_request(request, state).await.map(|Json(b)| b).unwrap_or_default();
        Ok(non_blank(body.text))
    }
}

/// Explain a legal document in plain language and sketch a mind map.
///
/// The document becomes the caller's chat context.
#[utoipa::path(
    post,
    path = "/api/demystify",
    tag = "documents",
    request_body(content = DocumentUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Explanation and mind map", body = serde_json::Value),
        (status = 400, description = "No text or file provided"),
        (status = 502, description = "AI analysis failed"),
    )
)]
pub async fn demystify(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    request: Request,
) -> Result<Json<Demystification>, ServerError> {
    let text = document_text(request, &state)
        .await?
        .ok_or_else(|| ServerError::BadRequest("No text or file provided".into()))?;

    let result = state
        .assistant
        .demystify(&text)
        .await
        .map_err(ServerError::upstream("AI analysis failed."))?;

    state.contexts.set(user.as_str(), text.as_str()).await;
    state
        .history
        .record(
            user.as_str(),
            HistoryEntry::new("Demystification", &text, Some(json!({ "explanation": result.explanation }))),
        )
        .await?;
    info!(chars = text.chars().count(), "document demystified");
    Ok(Json(result))
}

/// Answer a question, grounded in the caller's document when one is set.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "documents",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant answer", body = ChatResponse),
        (status = 400, description = "No question provided"),
        (status = 502, description = "AI chat failed"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ServerError> {
    let question = body
        .ok()
        .and_then(|Json(b)| non_blank(b.question))
        .ok_or_else(|| ServerError::BadRequest("No question provided".into()))?;

    let context = state.contexts.get(user.as_str()).await;
    let response = state
        .assistant
        .chat(&question, context.as_deref())
        .await
        .map_err(ServerError::upstream("AI chat failed."))?;
    Ok(Json(ChatResponse { response }))
}

#[utoipa::path(
    post,
    path = "/api/clear_context",
    tag = "documents",
    responses((status = 200, description = "Context removed", body = MessageResponse))
)]
pub async fn clear_context(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
) -> Json<MessageResponse> {
    state.contexts.clear(user.as_str()).await;
    Json(MessageResponse { message: "Context cleared".into() })
}

/// Read text aloud as MP3.
#[utoipa::path(
    post,
    path = "/api/speak",
    tag = "documents",
    request_body = TextRequest,
    responses(
        (status = 200, description = "MP3 audio", body = Vec<u8>, content_type = "audio/mpeg"),
        (status = 400, description = "No text provided"),
        (status = 502, description = "Failed to generate audio"),
    )
)]
pub async fn speak(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let text = body
        .ok()
        .and_then(|Json(b)| non_blank(b.text))
        .ok_or_else(|| ServerError::BadRequest("No text provided".into()))?;

    let audio = state
        .speech
        .speak(&text)
        .await
        .map_err(ServerError::upstream("Failed to generate audio."))?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}

/// The caller's activity, newest first.
#[utoipa::path(
    get,
    path = "/api/history",
    tag = "documents",
    responses((status = 200, description = "History entries", body = serde_json::Value))
)]
pub async fn history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
) -> Result<Json<Vec<HistoryEntry>>, ServerError> {
    Ok(Json(state.history.list(user.as_str()).await?))
}
