//! Drafting and review tools: e-stamp check, clause comparison and drafting,
//! rental agreement PDF and key-date extraction.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{Form, Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use lexi_core::{ClauseComparison, EstampCheck, RentalAgreement, check_estamp};
use serde_json::{Value, json};
use tracing::{debug, info};
use utoipa::OpenApi;

use super::upload::UploadForm;
use crate::error::ServerError;
use crate::schemas::{
    AgreementForm, DocumentUpload, DraftClauseRequest, DraftClauseResponse, TextRequest, non_blank,
};
use crate::state::AppState;

const AGREEMENT_FILENAME: &str = "Rental_Agreement.pdf";

#[derive(OpenApi)]
#[openapi(paths(verify_estamp, compare_clauses, draft_clause, draft_pdf, extract_key_dates))]
pub struct ToolsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/verify_estamp", post(verify_estamp))
        .route("/api/compare_clauses", post(compare_clauses))
        .route("/api/draft_clause", post(draft_clause))
        .route("/draft_pdf", post(draft_pdf))
        .route("/api/extract_key_dates", post(extract_key_dates))
}

/// Text of the uploaded `file` part. A body that is not multipart at all is
/// treated like a form without a file.
async fn uploaded_text(
    multipart: Result<Multipart, MultipartRejection>,
    missing: &'static str,
) -> Result<String, ServerError> {
    let multipart = multipart.map_err(|e| {
        debug!(error = %e, "expected a multipart upload");
        ServerError::BadRequest(missing.into())
    })?;
    UploadForm::read(multipart)
        .await?
        .file_text()
        .await?
        .ok_or_else(|| ServerError::BadRequest(missing.into()))
}

/// Look for an Indian e-stamp certificate number in an uploaded document.
#[utoipa::path(
    post,
    path = "/api/verify_estamp",
    tag = "tools",
    request_body(content = DocumentUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "`found` with the UIN, or `not_found`", body = Value),
        (status = 400, description = "A file is required"),
    )
)]
pub async fn verify_estamp(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<EstampCheck>, ServerError> {
    let text = uploaded_text(multipart, "A file is required.").await?;
    let check = check_estamp(&text);
    debug!(found = matches!(check, EstampCheck::Found { .. }), "e-stamp check");
    Ok(Json(check))
}

/// Compare a document against standard clauses.
#[utoipa::path(
    post,
    path = "/api/compare_clauses",
    tag = "tools",
    request_body = TextRequest,
    responses(
        (status = 200, description = "Missing and risky clauses", body = Value),
        (status = 400, description = "Document text is required"),
        (status = 502, description = "AI analysis failed"),
    )
)]
pub async fn compare_clauses(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Json<ClauseComparison>, ServerError> {
    let text = body
        .ok()
        .and_then(|Json(b)| non_blank(b.text))
        .ok_or_else(|| ServerError::BadRequest("Document text is required.".into()))?;

    let comparison = state
        .assistant
        .compare_clauses(&text)
        .await
        .map_err(ServerError::upstream("AI analysis failed."))?;
    Ok(Json(comparison))
}

#[utoipa::path(
    post,
    path = "/api/draft_clause",
    tag = "tools",
    request_body = DraftClauseRequest,
    responses(
        (status = 200, description = "Numbered clause", body = DraftClauseResponse),
        (status = 400, description = "Clause description is required"),
        (status = 502, description = "AI clause drafting failed"),
    )
)]
pub async fn draft_clause(
    State(state): State<Arc<AppState>>,
    body: Result<Json<DraftClauseRequest>, JsonRejection>,
) -> Result<Json<DraftClauseResponse>, ServerError> {
    let description = body
        .ok()
        .and_then(|Json(b)| non_blank(b.description))
        .ok_or_else(|| ServerError::BadRequest("Clause description is required.".into()))?;

    let clause = state
        .assistant
        .draft_clause(&description)
        .await
        .map_err(ServerError::upstream("AI clause drafting failed."))?;
    Ok(Json(DraftClauseResponse { clause }))
}

/// Render a rental agreement from form fields as a downloadable PDF. A body
/// that is not a urlencoded form renders the placeholder agreement.
#[utoipa::path(
    post,
    path = "/draft_pdf",
    tag = "tools",
    request_body(content = AgreementForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Rental agreement", body = Vec<u8>, content_type = "application/pdf"),
    )
)]
pub async fn draft_pdf(form: Result<Form<RentalAgreement>, FormRejection>) -> Result<Response, ServerError> {
    let agreement = match form {
        Ok(Form(agreement)) => agreement,
        Err(e) => {
            debug!(error = %e, "no agreement form; using placeholders");
            RentalAgreement::default()
        }
    };
    let pdf = tokio::task::spawn_blocking(move || agreement.render_pdf())
        .await
        .map_err(|e| ServerError::Internal(format!("pdf rendering panicked: {e}")))?
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    info!(size = pdf.len(), "rental agreement rendered");

    let disposition = format!("attachment; filename=\"{AGREEMENT_FILENAME}\"");
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/pdf".to_owned()), (header::CONTENT_DISPOSITION, disposition)],
        pdf,
    )
        .into_response())
}

/// Pull deadlines and other significant dates out of an uploaded document.
#[utoipa::path(
    post,
    path = "/api/extract_key_dates",
    tag = "tools",
    request_body(content = DocumentUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "`{key_dates: [{date, significance}]}`", body = Value),
        (status = 400, description = "No file was provided"),
        (status = 502, description = "AI date extraction failed"),
    )
)]
pub async fn extract_key_dates(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ServerError> {
    let text = uploaded_text(multipart, "No file was provided.").await?;
    let key_dates = state
        .assistant
        .key_dates(&text)
        .await
        .map_err(ServerError::upstream("AI date extraction failed."))?;
    Ok(Json(json!({ "key_dates": key_dates })))
}
