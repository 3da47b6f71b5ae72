//! Response finalization.
//!
//! # Responsibilities
//! - Serialize a present outcome as JSON with a JSON content type
//! - Apply status and headers collected in the response sink
//! - Produce exactly one response per exchange
//! - Summarize the exchange (status, params echo, return echo) and record metrics
//!
//! # Design Decisions
//! - Echoes are cut to a fixed budget so large payloads never flood logs
//! - Status >= 400 is logged at error level, everything else at info

use std::time::Instant;

use axum::body::Body;
use axum::http::header::{HeaderValue, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::Response;
use serde_json::Value;

use crate::http::context::ResponseSink;
use crate::http::cors;
use crate::observability::metrics;

/// Echoes longer than this are truncated.
pub(crate) const ECHO_BUDGET: usize = 48;
/// Characters kept from a truncated echo.
pub(crate) const ECHO_KEEP: usize = 40;

/// Facts about one request/response exchange.
#[derive(Debug, Clone)]
pub(crate) struct Exchange {
    pub method: Method,
    pub uri: Uri,
    pub request_id: String,
    pub handler: Option<String>,
    pub started: Instant,
    pub permissive_cors: bool,
}

impl Exchange {
    pub(crate) fn new(method: Method, uri: Uri, headers: &HeaderMap) -> Self {
        let request_id = headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        Self {
            method,
            uri,
            request_id,
            handler: None,
            started: Instant::now(),
            permissive_cors: false,
        }
    }
}

/// Write the handler's outcome. `body == None` is the absent-value sentinel.
pub(crate) fn finish(
    exchange: &Exchange,
    sink: &ResponseSink,
    body: Option<Value>,
    params: &Value,
) -> Response {
    let (mut status, mut headers) = sink.take();

    let text = match body.as_ref().map(serde_json::to_string) {
        Some(Ok(text)) => {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            Some(text)
        }
        Some(Err(e)) => {
            tracing::error!(request_id = %exchange.request_id, error = %e, "Failed to serialize handler result");
            status = StatusCode::INTERNAL_SERVER_ERROR;
            None
        }
        None => None,
    };

    if exchange.permissive_cors {
        cors::apply_permissive(&mut headers);
    }

    summarize(exchange, status, Some(params), text.as_deref());

    let mut response = Response::new(text.map(Body::from).unwrap_or_else(Body::empty));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Terminate without a handler result (miss, bad body, oversize body).
pub(crate) fn plain(
    exchange: &Exchange,
    status: StatusCode,
    message: &'static str,
    params: Option<&Value>,
) -> Response {
    summarize(exchange, status, params, None);

    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    if exchange.permissive_cors {
        cors::apply_permissive(response.headers_mut());
    }
    response
}

fn summarize(exchange: &Exchange, status: StatusCode, params: Option<&Value>, returned: Option<&str>) {
    let params = params.map(|p| truncate_echo(&p.to_string())).unwrap_or_default();
    let returned = returned.map(truncate_echo).unwrap_or_default();

    if status.as_u16() >= 400 {
        tracing::error!(
            request_id = %exchange.request_id,
            method = %exchange.method,
            uri = %exchange.uri,
            status = status.as_u16(),
            params = %params,
            returned = %returned,
            "[INCOMPLETE]"
        );
    } else {
        tracing::info!(
            request_id = %exchange.request_id,
            method = %exchange.method,
            uri = %exchange.uri,
            status = status.as_u16(),
            params = %params,
            returned = %returned,
            "[COMPLETE]"
        );
    }

    metrics::record_request(
        exchange.method.as_str(),
        status.as_u16(),
        exchange.handler.as_deref().unwrap_or("none"),
        exchange.started,
    );
}

/// Cut `text` to the echo budget, on a char boundary.
pub(crate) fn truncate_echo(text: &str) -> String {
    if text.chars().count() <= ECHO_BUDGET {
        return text.to_string();
    }
    let kept: String = text.chars().take(ECHO_KEEP).collect();
    format!("{kept} ...")
}
