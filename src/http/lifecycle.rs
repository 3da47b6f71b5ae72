//! Per-request lifecycle.
//!
//! # States
//! ```text
//! AwaitingBody ──chunk──▶ AwaitingBody
//!      │ (eager probe)         │ (stream end)
//!      ▼                       ▼
//! ParsingJson            BodyComplete ──▶ ParsingJson (JSON requests)
//!      │                       │
//!      └──────▶ Dispatched ◀───┘
//!                   │
//!                   ▼
//!               Finalized
//! ```
//!
//! # Responsibilities
//! - Buffer the body up to the configured cap
//! - Parse JSON bodies, either once at stream end (deferred) or as soon as
//!   a chunk looks like the end of a JSON value (eager)
//! - Run the handler exactly once, guarded by a fire-once latch checked at
//!   both the probe site and the stream-end site
//! - Bind arguments, invoke, route failures to recovery hooks, finalize

use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::Response;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::config::BodyPolicy;
use crate::error::{BoxError, RouterError};
use crate::http::context::{HandlerContext, QueryParams, RequestHead, RequestInfo};
use crate::http::finalize::{self, Exchange};
use crate::http::server::App;
use crate::registry::{signature, Args, Handler, HandlerResult, Outcome};

/// Last characters that can end a JSON value.
const JSON_TERMINATORS: &[u8] = b"le\"]}0123456789";

/// Recovery hook for handlers that fail (`Err` or panic).
pub type ErrorHook =
    Arc<dyn Fn(HandlerContext, BoxError) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Recovery hook for handlers that return [`Outcome::Failure`].
pub type FailureHook =
    Arc<dyn Fn(HandlerContext, Value) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub on_handler_error: Option<ErrorHook>,
    pub on_error_result: Option<FailureHook>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    AwaitingBody,
    ParsingJson,
    BodyComplete,
    Dispatched,
    Finalized,
}

/// One-shot guard: the first `try_fire` wins, every later call loses.
#[derive(Debug, Default)]
pub struct FireOnce(AtomicBool);

impl FireOnce {
    pub fn try_fire(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub fn fired(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Entry point for plain HTTP requests.
pub(crate) async fn handle(app: Arc<App>, req: Request<Body>, peer: SocketAddr) -> Response {
    let (parts, body) = req.into_parts();
    let mut exchange = Exchange::new(parts.method.clone(), parts.uri.clone(), &parts.headers);

    let handler = app
        .resolver
        .resolve(parts.uri.path(), parts.method.as_str())
        .filter(|h| h.as_http().is_some());
    let Some(handler) = handler else {
        let miss = RouterError::RouteMiss {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
        };
        tracing::debug!(error = %miss, "Request not routed");
        return finalize::plain(&exchange, miss.status(), "not found", None);
    };

    exchange.handler = Some(handler.name().to_string());
    exchange.permissive_cors = app.permissive_cors;

    let pending = PendingRequest {
        state: LifecycleState::AwaitingBody,
        expects_json: declares_json(&parts.headers),
        query: QueryParams::parse(parts.uri.query()),
        head: RequestHead::from_parts(&parts, peer),
        policy: app.body.policy,
        limit: app.body.max_bytes,
        buffer: Vec::new(),
        json: None,
        latch: FireOnce::default(),
        handler,
        exchange,
    };
    pending.run(app, body).await
}

struct PendingRequest {
    state: LifecycleState,
    handler: Arc<Handler>,
    head: RequestHead,
    exchange: Exchange,
    query: QueryParams,
    expects_json: bool,
    policy: BodyPolicy,
    limit: usize,
    buffer: Vec<u8>,
    json: Option<Value>,
    latch: FireOnce,
}

impl PendingRequest {
    async fn run(mut self, app: Arc<App>, body: Body) -> Response {
        let mut stream = body.into_data_stream();
        let mut job: Option<JoinHandle<Response>> = None;
        let mut trailing = 0usize;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) if job.is_some() => {
                    tracing::debug!(request_id = %self.exchange.request_id, error = %e, "Body failed after dispatch");
                    break;
                }
                Err(e) => return self.reject(RouterError::Body(e)),
            };

            // Already dispatched by the eager probe: drain and discard.
            if job.is_some() {
                trailing += chunk.len();
                if trailing > self.limit {
                    break;
                }
                continue;
            }

            if self.buffer.len() + chunk.len() > self.limit {
                let limit = self.limit;
                return self.reject(RouterError::PayloadTooLarge { limit });
            }
            self.buffer.extend_from_slice(&chunk);

            if self.policy == BodyPolicy::Eager && self.expects_json && looks_complete(&chunk) {
                self.transition(LifecycleState::ParsingJson);
                match serde_json::from_slice::<Value>(&self.buffer) {
                    Ok(value) if self.latch.try_fire() => {
                        self.json = Some(value);
                        self.transition(LifecycleState::Dispatched);
                        job = Some(tokio::spawn(dispatch(app.clone(), self.job())));
                    }
                    _ => self.transition(LifecycleState::AwaitingBody),
                }
            }
        }

        if trailing > 0 {
            tracing::debug!(request_id = %self.exchange.request_id, bytes = trailing, "Discarded body after dispatch");
        }

        if self.latch.try_fire() {
            self.transition(LifecycleState::BodyComplete);
            if self.expects_json && self.json.is_none() {
                self.transition(LifecycleState::ParsingJson);
                match serde_json::from_slice::<Value>(&self.buffer) {
                    Ok(value) => self.json = Some(value),
                    Err(e) => return self.reject(RouterError::MalformedJsonBody(e)),
                }
            }
            self.transition(LifecycleState::Dispatched);
            let response = dispatch(app, self.job()).await;
            return self.finalized(response);
        }

        let response = match job {
            Some(handle) => match handle.await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(request_id = %self.exchange.request_id, error = %e, "Dispatch task failed");
                    finalize::plain(&self.exchange, StatusCode::INTERNAL_SERVER_ERROR, "internal error", None)
                }
            },
            None => {
                tracing::error!(request_id = %self.exchange.request_id, "Latch fired without a dispatch");
                finalize::plain(&self.exchange, StatusCode::INTERNAL_SERVER_ERROR, "internal error", None)
            }
        };
        self.finalized(response)
    }

    fn transition(&mut self, next: LifecycleState) {
        tracing::trace!(
            request_id = %self.exchange.request_id,
            from = ?self.state,
            to = ?next,
            "Lifecycle transition"
        );
        self.state = next;
    }

    fn finalized(mut self, response: Response) -> Response {
        self.transition(LifecycleState::Finalized);
        response
    }

    fn reject(mut self, err: RouterError) -> Response {
        let message = match &err {
            RouterError::MalformedJsonBody(_) => "malformed JSON body",
            RouterError::PayloadTooLarge { .. } => "payload too large",
            RouterError::Body(_) => "failed to read request body",
            _ => "bad request",
        };
        tracing::warn!(request_id = %self.exchange.request_id, error = %err, "Request rejected before dispatch");
        self.latch.try_fire();
        let params = self.query.merged_with(None);
        let response = finalize::plain(&self.exchange, err.status(), message, Some(&params));
        self.transition(LifecycleState::Finalized);
        response
    }

    fn job(&self) -> Job {
        Job {
            handler: self.handler.clone(),
            info: RequestInfo {
                head: self.head.clone(),
                raw_body: String::from_utf8_lossy(&self.buffer).into_owned(),
                json: self.json.clone(),
            },
            query: self.query.clone(),
            exchange: self.exchange.clone(),
        }
    }
}

/// Everything the dispatch needs, detached from the body stream.
struct Job {
    handler: Arc<Handler>,
    info: RequestInfo,
    query: QueryParams,
    exchange: Exchange,
}

async fn dispatch(app: Arc<App>, job: Job) -> Response {
    let Job {
        handler,
        info,
        query,
        exchange,
    } = job;
    let params = query.merged_with(info.json.as_ref());

    let Some(callable) = handler.as_http().cloned() else {
        let miss = RouterError::RouteMiss {
            method: exchange.method.to_string(),
            path: exchange.uri.path().to_string(),
        };
        tracing::debug!(request_id = %exchange.request_id, error = %miss, "Handler is not callable over HTTP");
        return finalize::plain(&exchange, miss.status(), "not found", Some(&params));
    };

    let args = bind_arguments(&signature::bind(&handler), info.json.as_ref(), &query);
    let ctx = HandlerContext::new(info);
    let result = guarded(|| callable.call(ctx.clone(), args)).await;
    let body = settle(&app.hooks, &ctx, &exchange, result).await;
    finalize::finish(&exchange, &ctx.response, body, &params)
}

/// For each signature name: JSON body key, else first query value, else absent.
pub(crate) fn bind_arguments(signature: &[String], json: Option<&Value>, query: &QueryParams) -> Args {
    let body = json.and_then(Value::as_object);
    let values = signature
        .iter()
        .map(|name| {
            body.and_then(|object| object.get(name))
                .cloned()
                .or_else(|| query.get(name).map(|v| Value::String(v.to_string())))
        })
        .collect();
    Args::new(values)
}

/// Resolve the handler result into the body to write (`None` = empty).
async fn settle(
    hooks: &Hooks,
    ctx: &HandlerContext,
    exchange: &Exchange,
    result: HandlerResult,
) -> Option<Value> {
    match result {
        Ok(Outcome::Empty) => None,
        Ok(Outcome::Json(value)) => Some(value),
        Ok(Outcome::Failure(value)) => {
            ctx.response.escalate();
            match &hooks.on_error_result {
                Some(hook) => recover(guarded(|| hook(ctx.clone(), value)).await, exchange, "on_error_result"),
                None => Some(value),
            }
        }
        Err(e) => {
            tracing::error!(
                request_id = %exchange.request_id,
                handler = exchange.handler.as_deref().unwrap_or("none"),
                error = %e,
                "Handler failed"
            );
            ctx.response.escalate();
            match &hooks.on_handler_error {
                Some(hook) => recover(guarded(|| hook(ctx.clone(), e)).await, exchange, "on_handler_error"),
                None => None,
            }
        }
    }
}

fn recover(result: HandlerResult, exchange: &Exchange, hook: &'static str) -> Option<Value> {
    match result {
        Ok(Outcome::Empty) => None,
        Ok(Outcome::Json(value)) | Ok(Outcome::Failure(value)) => Some(value),
        Err(e) => {
            tracing::warn!(request_id = %exchange.request_id, hook, error = %e, "Recovery hook failed");
            None
        }
    }
}

/// Call a handler and await its future, turning a panic in either step into
/// an ordinary failure.
async fn guarded<F>(call: F) -> HandlerResult
where
    F: FnOnce() -> BoxFuture<'static, HandlerResult>,
{
    match AssertUnwindSafe(async move { call().await }).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(panic_message(panic).into()),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned());
    match detail {
        Some(detail) => format!("handler panicked: {detail}"),
        None => "handler panicked".to_string(),
    }
}

fn declares_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("application/json"))
}

/// Does the chunk end (ignoring whitespace) with a character a JSON value can end with?
fn looks_complete(chunk: &[u8]) -> bool {
    chunk
        .iter()
        .rev()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| JSON_TERMINATORS.contains(b))
}
