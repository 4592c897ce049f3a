//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (per-request trace ids, CORS, caller identity, body limit)
//! - OpenAPI document at `/api-docs/openapi.json`
//! - Health route
//! - Translation task routes
//! - Document analysis and drafting tool routes

pub mod doc;
mod documents;
mod health;
mod tools;
mod translate;
mod upload;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;

use crate::middleware::{cors, identity, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(translate::router())
        .merge(documents::router())
        .merge(tools::router())
        .merge(doc::router())
        // Outermost layers execute first on the way in.
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(middleware::from_fn(identity::identify_user))
        .layer(cors::cors_layer(&state.config))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
