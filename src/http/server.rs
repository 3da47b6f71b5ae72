//! HTTP server setup and dispatch.
//!
//! # Responsibilities
//! - Assemble the handler tree, resolver, CORS policy and recovery hooks
//! - Serve plain or TLS connections with graceful shutdown
//! - Wire up middleware (request ID set + propagate)
//! - Split each request into the WebSocket gateway or the HTTP lifecycle
//!
//! # Design Decisions
//! - One tower service per connection so the peer address reaches handlers
//! - The service error type is `RouterError`: an error drops the
//!   connection without a response, which is how unmapped upgrades are refused

use std::convert::Infallible;
use std::future::{ready, Future, Ready};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum_server::Handle;
use futures_util::future::BoxFuture;
use hyper::body::Incoming;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tower::{Layer, Service};
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestId, PropagateRequestIdLayer, SetRequestId,
    SetRequestIdLayer,
};

use crate::config::{BodyConfig, ServerConfig, WebSocketConfig};
use crate::error::{BoxError, RouterError};
use crate::http::context::HandlerContext;
use crate::http::cors::CorsPolicy;
use crate::http::lifecycle::{self, ErrorHook, FailureHook, Hooks};
use crate::http::websocket::{self, GatewaySettings};
use crate::lifecycle::{wait_for_ctrl_c, Shutdown};
use crate::net::tls;
use crate::registry::{HandlerResult, HandlerTree};
use crate::routing::PathResolver;

/// Shared state for every connection.
pub(crate) struct App {
    pub resolver: PathResolver,
    pub body: BodyConfig,
    pub permissive_cors: bool,
    pub hooks: Hooks,
    pub websocket: WebSocketConfig,
    pub gateway: OnceLock<GatewaySettings>,
}

impl App {
    pub(crate) fn gateway(&self) -> &GatewaySettings {
        self.gateway
            .get_or_init(|| GatewaySettings::from_config(&self.websocket))
    }

    async fn serve(
        self: Arc<Self>,
        req: Request<Body>,
        peer: SocketAddr,
    ) -> Result<Response, RouterError> {
        if websocket::is_upgrade(req.headers()) {
            websocket::upgrade(self, req, peer).await
        } else {
            Ok(lifecycle::handle(self, req, peer).await)
        }
    }
}

/// HTTP/WebSocket server dispatching to a handler tree.
pub struct HttpServer {
    app: Arc<App>,
    config: ServerConfig,
}

impl HttpServer {
    pub fn builder(tree: HandlerTree) -> HttpServerBuilder {
        HttpServerBuilder {
            tree,
            config: ServerConfig::default(),
            cors: None,
            hooks: Hooks::default(),
        }
    }

    /// Server with no custom CORS handler or recovery hooks.
    pub fn new(tree: HandlerTree, config: ServerConfig) -> Self {
        Self::builder(tree).config(config).build()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.app.resolver
    }

    /// Dispatch one request in-process, as if it came from `0.0.0.0:0`.
    pub async fn handle(&self, req: Request<Body>) -> Result<Response, RouterError> {
        let peer = SocketAddr::from(([0, 0, 0, 0], 0));
        self.app.clone().serve(req, peer).await
    }

    /// Bind `{host}:{port}` (the configured port when `None`) and serve until Ctrl+C.
    pub async fn listen(self, port: Option<u16>) -> Result<(), RouterError> {
        let port = port.unwrap_or(self.config.port);
        let addr = format!("{}:{}", self.config.transport.host, port);
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(address = %addr, "web server listening");

        let shutdown = Shutdown::new();
        let signal = shutdown.subscribe();
        tokio::spawn(async move {
            wait_for_ctrl_c().await;
            shutdown.trigger();
        });

        self.run(listener, signal).await
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight
    /// requests for up to the configured grace period.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), RouterError> {
        let addr = listener.local_addr()?;
        let listener = listener.into_std()?;
        listener.set_nonblocking(true)?;

        let handle = Handle::new();
        let grace = Duration::from_secs(self.config.transport.graceful_shutdown_secs);
        let watcher = handle.clone();
        tokio::spawn(async move {
            match shutdown.recv().await {
                Ok(()) | Err(RecvError::Lagged(_)) => {
                    tracing::info!("Draining connections");
                    watcher.graceful_shutdown(Some(grace));
                }
                Err(RecvError::Closed) => {}
            }
        });

        let make_service = MakeDispatch {
            app: self.app.clone(),
        };
        let keep_alive = self.config.transport.keep_alive;

        match &self.config.tls {
            Some(tls_config) => {
                let rustls = tls::load_tls_config(tls_config).await?;
                tracing::info!(address = %addr, tls = true, "HTTP server starting");
                let mut server =
                    axum_server::tls_rustls::from_tcp_rustls(listener, rustls).handle(handle);
                server.http_builder().http1().keep_alive(keep_alive);
                server.serve(make_service).await?;
            }
            None => {
                tracing::info!(address = %addr, tls = false, "HTTP server starting");
                let mut server = axum_server::from_tcp(listener).handle(handle);
                server.http_builder().http1().keep_alive(keep_alive);
                server.serve(make_service).await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Assembles an [`HttpServer`].
pub struct HttpServerBuilder {
    tree: HandlerTree,
    config: ServerConfig,
    cors: Option<CorsPolicy>,
    hooks: Hooks,
}

impl HttpServerBuilder {
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the CORS behaviour selected by `config.cors`.
    pub fn cors(mut self, policy: CorsPolicy) -> Self {
        self.cors = Some(policy);
        self
    }

    /// Called when a handler returns `Err` or panics. Its result replaces
    /// the response body; the status is already at least 500.
    pub fn on_handler_error<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HandlerContext, BoxError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let hook: ErrorHook = Arc::new(
            move |ctx: HandlerContext, err: BoxError| -> BoxFuture<'static, HandlerResult> {
                Box::pin(hook(ctx, err))
            },
        );
        self.hooks.on_handler_error = Some(hook);
        self
    }

    /// Called when a handler returns [`crate::registry::Outcome::Failure`].
    pub fn on_error_result<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HandlerContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let hook: FailureHook = Arc::new(
            move |ctx: HandlerContext, value: Value| -> BoxFuture<'static, HandlerResult> {
                Box::pin(hook(ctx, value))
            },
        );
        self.hooks.on_error_result = Some(hook);
        self
    }

    pub fn build(self) -> HttpServer {
        let HttpServerBuilder {
            mut tree,
            config,
            cors,
            hooks,
        } = self;

        let policy = cors.unwrap_or_else(|| CorsPolicy::from_flag(config.cors));
        let (cors_handler, permissive_cors) = policy.into_parts();
        tree.install_cors(cors_handler);

        let resolver = PathResolver::new(tree, config.static_mapping);
        let app = App {
            resolver,
            body: config.body.clone(),
            permissive_cors,
            hooks,
            websocket: config.websocket.clone(),
            gateway: OnceLock::new(),
        };

        HttpServer {
            app: Arc::new(app),
            config,
        }
    }
}

type Stack = SetRequestId<PropagateRequestId<DispatchService>, MakeRequestUuid>;

/// Builds the per-connection service stack.
#[derive(Clone)]
struct MakeDispatch {
    app: Arc<App>,
}

impl Service<SocketAddr> for MakeDispatch {
    type Response = Stack;
    type Error = Infallible;
    type Future = Ready<Result<Stack, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, peer: SocketAddr) -> Self::Future {
        let service = DispatchService {
            app: self.app.clone(),
            peer,
        };
        let service = PropagateRequestIdLayer::x_request_id().layer(service);
        ready(Ok(SetRequestIdLayer::x_request_id(MakeRequestUuid).layer(service)))
    }
}

#[derive(Clone)]
struct DispatchService {
    app: Arc<App>,
    peer: SocketAddr,
}

impl Service<Request<Incoming>> for DispatchService {
    type Response = Response;
    type Error = RouterError;
    type Future = BoxFuture<'static, Result<Response, RouterError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Incoming>) -> Self::Future {
        let app = self.app.clone();
        let peer = self.peer;
        Box::pin(app.serve(req.map(Body::new), peer))
    }
}
