//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a `{"error": ...}` JSON body with an appropriate status code.
//!
//! Store and internal errors are logged with full detail but only a generic
//! message is returned to the caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lexi_core::{DispatchError, ExtractError, StoreError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// All errors that can occur in the lexi-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller sent an invalid or incomplete request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A collaborator (LLM, TTS) failed or answered with garbage. The
    /// message is client-safe; the cause was logged when this was built.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// Propagated from a task or history store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Map a collaborator error to [`ServerError::Upstream`] with a
    /// client-facing `message`, logging the underlying cause.
    pub fn upstream<E: std::fmt::Display>(message: &'static str) -> impl FnOnce(E) -> ServerError {
        move |e| {
            error!(error = %e, "{message}");
            ServerError::Upstream(message.to_owned())
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Upstream(m) => (StatusCode::BAD_GATEWAY, m.clone()),

            // Internal errors: log the full detail, keep it private.
            ServerError::Store(e) => {
                error!(error = %e, "store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<ExtractError> for ServerError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::Interrupted { detail } => {
                ServerError::Internal(format!("document extraction interrupted: {detail}"))
            }
            e => {
                if let ExtractError::DecodeError { detail } = &e {
                    tracing::warn!(detail = %detail, "document decode failed");
                }
                ServerError::BadRequest(e.to_string())
            }
        }
    }
}

impl From<DispatchError> for ServerError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::MissingContent => ServerError::BadRequest(e.to_string()),
            DispatchError::Store(e) => ServerError::Store(e),
            DispatchError::Schedule(m) => ServerError::Internal(format!("failed to schedule task: {m}")),
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}
