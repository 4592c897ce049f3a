use axum::http::{HeaderName, HeaderValue};
use tower_http::cors::{Any, CorsLayer};

use super::trace::X_TRACE_ID;
use crate::config::Config;

/// CORS layer from `LEXI_CORS_ORIGINS`; any origin when unset or unparsable.
pub fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .as_deref()
        .map(|list| list.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();

    // x-trace-id stays readable from browser scripts.
    let layer = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .expose_headers([HeaderName::from_static(X_TRACE_ID)]);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}
