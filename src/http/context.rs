//! Request view and response sink handed to handlers.
//!
//! # Responsibilities
//! - Expose the inbound request (head, raw body, parsed JSON) read-only
//! - Let handlers adjust status and headers before the finalizer writes
//! - Decode the query string once per request

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::http::header::{HeaderMap, HeaderValue, IntoHeaderName};
use axum::http::request::Parts;
use axum::http::{Method, StatusCode, Uri};
use serde_json::{Map, Value};

/// Head of an inbound request, as seen by socket handlers.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub peer: SocketAddr,
}

impl RequestHead {
    pub(crate) fn from_parts(parts: &Parts, peer: SocketAddr) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            peer,
        }
    }
}

/// Everything a handler can read about its request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub head: RequestHead,
    /// The body as received, decoded lossily as UTF-8.
    pub raw_body: String,
    /// Parsed body, present only for JSON requests.
    pub json: Option<Value>,
}

impl RequestInfo {
    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }
}

#[derive(Debug)]
struct ResponseHead {
    status: StatusCode,
    headers: HeaderMap,
}

/// Status and headers of the response under construction.
///
/// Cloning shares the same underlying head; the finalizer takes it once the
/// handler has returned.
#[derive(Debug, Clone)]
pub struct ResponseSink {
    inner: Arc<Mutex<ResponseHead>>,
}

impl Default for ResponseSink {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ResponseHead {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
            })),
        }
    }
}

impl ResponseSink {
    fn lock(&self) -> MutexGuard<'_, ResponseHead> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn status(&self) -> StatusCode {
        self.lock().status
    }

    pub fn set_status(&self, status: StatusCode) {
        self.lock().status = status;
    }

    pub fn set_header<K: IntoHeaderName>(&self, name: K, value: HeaderValue) {
        self.lock().headers.insert(name, value);
    }

    pub fn header(&self, name: &str) -> Option<HeaderValue> {
        self.lock().headers.get(name).cloned()
    }

    /// Raise the status to 500 unless the handler already chose an error code.
    pub(crate) fn escalate(&self) {
        let mut head = self.lock();
        if head.status.as_u16() < 400 {
            head.status = StatusCode::INTERNAL_SERVER_ERROR;
        }
    }

    pub(crate) fn take(&self) -> (StatusCode, HeaderMap) {
        let mut head = self.lock();
        (head.status, std::mem::take(&mut head.headers))
    }
}

/// The `{request, response}` pair every HTTP handler runs against.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub request: Arc<RequestInfo>,
    pub response: ResponseSink,
}

impl HandlerContext {
    pub fn new(request: RequestInfo) -> Self {
        Self {
            request: Arc::new(request),
            response: ResponseSink::default(),
        }
    }
}

/// Decoded query string, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn parse(query: Option<&str>) -> Self {
        let pairs = query
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self(pairs)
    }

    /// First value for `name`; later duplicates are ignored.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Query merged with a JSON object body, body keys winning. Used for log echo.
    pub(crate) fn merged_with(&self, json: Option<&Value>) -> Value {
        let mut map = Map::new();
        for (k, v) in &self.0 {
            map.entry(k.clone()).or_insert_with(|| Value::String(v.clone()));
        }
        if let Some(Value::Object(body)) = json {
            for (k, v) in body {
                map.insert(k.clone(), v.clone());
            }
        }
        Value::Object(map)
    }
}
