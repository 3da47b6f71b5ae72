//! WebSocket upgrade routing.
//!
//! # Responsibilities
//! - Detect WebSocket upgrade requests
//! - Resolve the path against `ws` handlers
//! - Complete the handshake and hand the socket to the handler
//!
//! # Data Flow
//! ```text
//! Upgrade request → resolve(path, "ws")
//!     hit  → handshake → [CONNECT] → socket handler → [DISCONNECT]
//!     miss → connection dropped, no handshake response
//! ```
//!
//! # Design Decisions
//! - A miss surfaces as a service error so the connection is closed
//!   without writing any HTTP response
//! - Message and frame limits come from config, read once per process

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::FromRequestParts;
use axum::http::header::UPGRADE;
use axum::http::{HeaderMap, Request};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::config::WebSocketConfig;
use crate::error::RouterError;
use crate::http::context::RequestHead;
use crate::http::server::App;
use crate::observability::metrics;
use crate::registry::Handler;
use crate::routing::WS_METHOD;

/// Limits applied to every accepted socket.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GatewaySettings {
    pub max_message_size: usize,
    pub max_frame_size: usize,
}

impl GatewaySettings {
    pub(crate) fn from_config(config: &WebSocketConfig) -> Self {
        tracing::info!(
            max_message_size = config.max_message_size,
            max_frame_size = config.max_frame_size,
            "WebSocket gateway initialized"
        );
        Self {
            max_message_size: config.max_message_size,
            max_frame_size: config.max_frame_size,
        }
    }
}

pub(crate) fn is_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

pub(crate) async fn upgrade(
    app: Arc<App>,
    req: Request<Body>,
    peer: SocketAddr,
) -> Result<Response, RouterError> {
    let path = req.uri().path().to_string();

    let Some(handler) = app.resolver.resolve(&path, WS_METHOD) else {
        metrics::upgrade_rejected();
        tracing::warn!(path = %path, peer = %peer, "[MISMATCHED] Dropping websocket upgrade");
        return Err(RouterError::UpgradeRejected { path });
    };

    let (mut parts, _body) = req.into_parts();
    let head = RequestHead::from_parts(&parts, peer);

    let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::warn!(path = %path, peer = %peer, reason = %rejection, "Invalid websocket handshake");
            return Ok(rejection.into_response());
        }
    };

    let settings = app.gateway();
    let response = ws
        .max_message_size(settings.max_message_size)
        .max_frame_size(settings.max_frame_size)
        .on_failed_upgrade(move |e| {
            tracing::warn!(peer = %peer, error = %e, "Websocket upgrade failed");
        })
        .on_upgrade(move |socket| session(handler, socket, head));
    Ok(response)
}

async fn session(handler: Arc<Handler>, mut socket: WebSocket, head: RequestHead) {
    // Let the handshake response flush before the handler touches the socket.
    tokio::task::yield_now().await;

    let session_id = Uuid::new_v4();
    let peer = head.peer;
    let path = head.uri.path().to_string();

    tracing::info!(peer = %peer, session = %session_id, path = %path, "[CONNECT]");
    metrics::websocket_opened();

    match handler.as_socket().cloned() {
        Some(socket_handler) => socket_handler.call(socket, head).await,
        None => {
            tracing::warn!(session = %session_id, handler = handler.name(), "Handler cannot own a socket");
            let _ = socket.send(Message::Close(None)).await;
        }
    }

    tracing::info!(peer = %peer, session = %session_id, path = %path, "[DISCONNECT]");
    metrics::websocket_closed();
}
