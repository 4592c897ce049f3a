//! Liveness and readiness.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::warn;
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Report the version and the task backend in use.
///
/// In queue mode the database is pinged; when it does not answer the
/// endpoint returns `503` with `"status": "degraded"`.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is healthy", body = Value),
        (status = 503, description = "Queue database unreachable", body = Value),
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let database = match &state.pool {
        None => "unused",
        Some(pool) => match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => "ok",
            Err(e) => {
                warn!(error = %e, "health check could not reach the database");
                "unreachable"
            }
        },
    };
    let (status, label) = if database == "unreachable" {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };
    let body = json!({
        "status": label,
        "version": env!("CARGO_PKG_VERSION"),
        "task_backend": state.task_backend,
        "database": database,
    });
    (status, Json(body))
}
