use axum::body::Body;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

pub static X_USER_ID: &str = "x-user-id";

/// Used when a request carries no usable `x-user-id`.
pub const ANONYMOUS: &str = "anonymous";

const MAX_USER_ID_LEN: usize = 128;

/// Caller identity attached to every request by [`identify_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Resolve the caller from the `x-user-id` header and store it as a
/// [`UserId`] request extension.
pub async fn identify_user(mut req: Request<Body>, next: Next) -> Response {
    let user = req
        .headers()
        .get(X_USER_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_USER_ID_LEN)
        .unwrap_or(ANONYMOUS)
        .to_owned();
    tracing::Span::current().record("user", user.as_str());
    req.extensions_mut().insert(UserId(user));
    next.run(req).await
}
