//! Asynchronous translation endpoints.
//!
//! `POST /api/translate` registers a task and returns `202 {task_id}` at
//! once; clients poll `GET /api/translation_status/{task_id}` until the
//! record leaves `processing`.

use std::sync::Arc;

use axum::extract::{Extension, FromRequest, Multipart, Path, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use lexi_core::{DispatchError, TranslationContent};
use serde_json::json;
use tracing::debug;
use utoipa::OpenApi;

use super::upload::UploadForm;
use crate::error::ServerError;
use crate::middleware::UserId;
use crate::schemas::{TaskAccepted, TranslateRequest, non_blank};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(translate, translation_status))]
pub struct TranslateApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/translate", post(translate))
        .route("/api/translation_status/{task_id}", get(translation_status))
}

fn missing() -> ServerError {
    DispatchError::MissingContent.into()
}

/// The multipart `languages` field is a JSON array of codes.
fn parse_language_list(raw: Option<&str>) -> Result<Vec<String>, ServerError> {
    let raw = raw.unwrap_or("[]");
    serde_json::from_str(raw).map_err(|e| {
        debug!(error = %e, raw, "unparsable languages field");
        missing()
    })
}

/// Start a translation task.
///
/// Accepts either `multipart/form-data` (`file` plus a `languages` JSON
/// array string) or a JSON body `{"text": ..., "languages": [...]}`.
#[utoipa::path(
    post,
    path = "/api/translate",
    tag = "translation",
    request_body(
        content(
            (TranslateRequest = "application/json"),
            (crate::schemas::TranslateUpload = "multipart/form-data"),
        )
    ),
    responses(
        (status = 202, description = "Task accepted", body = TaskAccepted),
        (status = 400, description = "Missing content or languages"),
    )
)]
pub async fn translate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    request: Request,
) -> Result<(StatusCode, Json<TaskAccepted>), ServerError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (content, languages) = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;
        let form = UploadForm::read(multipart).await?;
        let languages = parse_language_list(form.field("languages"))?;
        let content = match form.file {
            Some(file) => TranslationContent::File { bytes: file.bytes, filename: file.filename },
            None => {
                let text = non_blank(form.field("text").map(str::to_owned)).ok_or_else(missing)?;
                TranslationContent::Text(text)
            }
        };
        (content, languages)
    } else {
        let Json(body) = Json::<TranslateRequest>::from_request(request, &state).await.map_err(|e| {
            debug!(error = %e.body_text(), "rejected translate body");
            missing()
        })?;
        let text = non_blank(body.text).ok_or_else(missing)?;
        (TranslationContent::Text(text), body.languages)
    };

    let task_id = state.dispatcher.dispatch(user.as_str(), content, languages).await?;
    Ok((StatusCode::ACCEPTED, Json(TaskAccepted { task_id })))
}

/// Current record of a translation task.
#[utoipa::path(
    get,
    path = "/api/translation_status/{task_id}",
    tag = "translation",
    params(("task_id" = String, Path, description = "Id returned by /api/translate")),
    responses(
        (status = 200, description = "Task record", body = serde_json::Value),
        (status = 404, description = "Unknown task id", body = serde_json::Value),
    )
)]
pub async fn translation_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Response, ServerError> {
    match state.tasks.get(&task_id).await? {
        Some(record) => Ok(Json(record).into_response()),
        None => Ok((StatusCode::NOT_FOUND, Json(json!({ "status": "not_found" }))).into_response()),
    }
}
