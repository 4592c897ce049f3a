use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use super::{documents, health, tools, translate};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "lexi-server",
        description = "Legal document assistant API: asynchronous translation, plain-language analysis and drafting tools"
    ),
    tags(
        (name = "translation", description = "Background translation tasks"),
        (name = "documents", description = "Document analysis, chat and speech"),
        (name = "tools", description = "Drafting and review tools"),
        (name = "health"),
    )
)]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(translate::TranslateApi::openapi());
    root.merge(documents::DocumentsApi::openapi());
    root.merge(tools::ToolsApi::openapi());
    root
}

pub fn router() -> Router<Arc<AppState>> {
    let docs = get_docs();
    Router::new().route("/api-docs/openapi.json", get(move || async move { Json(docs) }))
}
