//! Handlers: the callables application code registers.
//!
//! A handler is a name (which drives the routing convention), a declared
//! parameter list, and either an HTTP callable or a socket callable.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use axum::extract::ws::WebSocket;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::BoxError;
use crate::http::context::{HandlerContext, RequestHead};

/// What a handler hands back to the finalizer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing to send; the response has an empty body.
    Empty,
    /// Serialized as the JSON response body.
    Json(Value),
    /// An error-like result, routed to the `on_error_result` hook.
    Failure(Value),
}

impl Outcome {
    pub fn empty() -> HandlerResult {
        Ok(Outcome::Empty)
    }

    /// Serialize `value` into a JSON outcome.
    pub fn json<T: Serialize>(value: T) -> HandlerResult {
        Ok(Outcome::Json(serde_json::to_value(value)?))
    }

    /// Serialize `value` into an error-like outcome.
    pub fn failure<T: Serialize>(value: T) -> HandlerResult {
        Ok(Outcome::Failure(serde_json::to_value(value)?))
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Outcome::Json(value)
    }
}

pub type HandlerResult = Result<Outcome, BoxError>;

/// Positional arguments bound from the request, one slot per signature name.
///
/// `None` is the absent-value sentinel: the request carried no value for
/// that parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Vec<Option<Value>>);

impl Args {
    pub fn new(values: Vec<Option<Value>>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index).and_then(Option::as_ref)
    }

    pub fn str(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(Value::as_str)
    }

    /// Deserialize slot `index`. Query values arrive as strings, so a string
    /// that does not fit `T` directly is retried as JSON text (`"42"` → 42).
    pub fn parse<T: DeserializeOwned>(&self, index: usize) -> Result<Option<T>, BoxError> {
        let Some(value) = self.get(index) else {
            return Ok(None);
        };
        match serde_json::from_value::<T>(value.clone()) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(err) => match value {
                Value::String(text) => Ok(Some(serde_json::from_str(text).map_err(|_| err)?)),
                _ => Err(err.into()),
            },
        }
    }

    /// Like [`Args::parse`] but absence is an error naming the parameter.
    pub fn require<T: DeserializeOwned>(&self, index: usize, name: &str) -> Result<T, BoxError> {
        self.parse(index)?
            .ok_or_else(|| format!("missing required parameter `{name}`").into())
    }

    pub fn into_vec(self) -> Vec<Option<Value>> {
        self.0
    }
}

/// An HTTP endpoint callable.
pub trait HttpHandler: Send + Sync + 'static {
    fn call(&self, ctx: HandlerContext, args: Args) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> HttpHandler for F
where
    F: Fn(HandlerContext, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: HandlerContext, args: Args) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(ctx, args))
    }
}

/// A WebSocket endpoint callable; owns the socket for the session.
pub trait SocketHandler: Send + Sync + 'static {
    fn call(&self, socket: WebSocket, head: RequestHead) -> BoxFuture<'static, ()>;
}

impl<F, Fut> SocketHandler for F
where
    F: Fn(WebSocket, RequestHead) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, socket: WebSocket, head: RequestHead) -> BoxFuture<'static, ()> {
        Box::pin(self(socket, head))
    }
}

#[derive(Clone)]
pub enum HandlerKind {
    Http(Arc<dyn HttpHandler>),
    Socket(Arc<dyn SocketHandler>),
}

/// A registered handler.
pub struct Handler {
    name: String,
    declared: Vec<String>,
    pub(crate) signature: OnceLock<Arc<[String]>>,
    kind: HandlerKind,
}

impl Handler {
    /// Register an HTTP handler. `name` follows the `<method><Path>`
    /// convention (`getProfile`, `post_rename`); `params` lists the argument
    /// names in call order.
    pub fn http<F, Fut>(name: impl Into<String>, params: &[&str], func: F) -> Self
    where
        F: Fn(HandlerContext, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            declared: params.iter().map(|p| p.to_string()).collect(),
            signature: OnceLock::new(),
            kind: HandlerKind::Http(Arc::new(func)),
        }
    }

    /// Register a socket handler. Its name starts with `ws` (`wsChat`).
    pub fn socket<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(WebSocket, RequestHead) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            declared: Vec::new(),
            signature: OnceLock::new(),
            kind: HandlerKind::Socket(Arc::new(func)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter descriptors exactly as declared at registration.
    pub fn declared_params(&self) -> &[String] {
        &self.declared
    }

    pub fn kind(&self) -> &HandlerKind {
        &self.kind
    }

    pub fn as_http(&self) -> Option<&Arc<dyn HttpHandler>> {
        match &self.kind {
            HandlerKind::Http(h) => Some(h),
            HandlerKind::Socket(_) => None,
        }
    }

    pub fn as_socket(&self) -> Option<&Arc<dyn SocketHandler>> {
        match &self.kind {
            HandlerKind::Socket(h) => Some(h),
            HandlerKind::Http(_) => None,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            HandlerKind::Http(_) => "http",
            HandlerKind::Socket(_) => "socket",
        };
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("declared", &self.declared)
            .field("kind", &kind)
            .finish()
    }
}
