//! HTTP middleware stack: per-request trace ids, CORS and caller identity.

pub mod cors;
pub mod identity;
pub mod trace;

pub use identity::UserId;
