//! CORS policy.
//!
//! `cors = false` leaves unmatched `OPTIONS` requests to 404. `cors = true`
//! installs a no-op 200 responder and stamps permissive headers on every
//! routed response. A custom handler replaces the responder and leaves the
//! headers to the handler.

use axum::http::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};

use crate::registry::{Handler, Outcome};

#[derive(Debug, Default)]
pub enum CorsPolicy {
    #[default]
    Disabled,
    Permissive,
    Custom(Handler),
}

impl CorsPolicy {
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            CorsPolicy::Permissive
        } else {
            CorsPolicy::Disabled
        }
    }

    pub fn is_permissive(&self) -> bool {
        matches!(self, CorsPolicy::Permissive)
    }

    /// Split into the fallback handler for the tree and the header switch.
    pub(crate) fn into_parts(self) -> (Option<Handler>, bool) {
        match self {
            CorsPolicy::Disabled => (None, false),
            CorsPolicy::Permissive => (Some(preflight_responder()), true),
            CorsPolicy::Custom(handler) => (Some(handler), false),
        }
    }
}

fn preflight_responder() -> Handler {
    Handler::http("options", &[], |_ctx, _args| async { Outcome::empty() })
}

/// Fill in the permissive CORS set. Headers the handler already set are kept.
pub(crate) fn apply_permissive(headers: &mut HeaderMap) {
    headers
        .entry(ACCESS_CONTROL_ALLOW_ORIGIN)
        .or_insert(HeaderValue::from_static("*"));
    headers
        .entry(ACCESS_CONTROL_ALLOW_METHODS)
        .or_insert(HeaderValue::from_static("GET,POST"));
    headers
        .entry(ACCESS_CONTROL_ALLOW_HEADERS)
        .or_insert(HeaderValue::from_static("x-requested-with,content-type"));
}
