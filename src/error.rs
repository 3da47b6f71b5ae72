//! Error types shared across the router.
//!
//! # Design Decisions
//! - Request-path errors map to exactly one HTTP status (or a dropped
//!   connection for rejected upgrades)
//! - Handler failures are boxed so application code can use any error type

use axum::http::StatusCode;
use thiserror::Error;

/// Boxed error returned by application handlers and recovery hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while routing or serving a request.
#[derive(Debug, Error)]
pub enum RouterError {
    /// No handler for method + path.
    #[error("no route for {method} {path}")]
    RouteMiss { method: String, path: String },

    /// The request declared a JSON body that failed to parse.
    #[error("malformed JSON body: {0}")]
    MalformedJsonBody(#[source] serde_json::Error),

    /// The buffered body grew past the configured cap.
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// The body stream failed mid-read.
    #[error("failed to read request body: {0}")]
    Body(#[from] axum::Error),

    /// A WebSocket upgrade targeted a path with no `ws` handler.
    #[error("websocket upgrade rejected for {path}")]
    UpgradeRejected { path: String },

    /// TLS material could not be loaded.
    #[error("tls setup failed: {0}")]
    Tls(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RouterError {
    /// HTTP status reported for this error when a response is still possible.
    pub fn status(&self) -> StatusCode {
        match self {
            RouterError::RouteMiss { .. } => StatusCode::NOT_FOUND,
            RouterError::MalformedJsonBody(_) | RouterError::Body(_) => StatusCode::BAD_REQUEST,
            RouterError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RouterError::UpgradeRejected { .. } => StatusCode::NOT_FOUND,
            RouterError::Tls(_) | RouterError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errors raised while building the handler tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("handler or group name must not be empty")]
    EmptyName,

    /// Two entries in the same group normalize to the same key.
    #[error("duplicate entry `{key}` in group `{group}`")]
    Duplicate { group: String, key: String },

    #[error("`{0}` is reserved")]
    ReservedName(String),
}
