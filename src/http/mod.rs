//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (request ID layers, per-connection service)
//!     → websocket.rs (upgrade requests)
//!     → lifecycle.rs (resolve, buffer body, bind arguments, invoke once)
//!     → finalize.rs (status, headers, JSON body, exchange summary)
//!     → Send to client
//! ```

pub mod context;
pub mod cors;
pub(crate) mod finalize;
pub mod lifecycle;
pub mod server;
pub mod websocket;

pub use context::{HandlerContext, QueryParams, RequestHead, RequestInfo, ResponseSink};
pub use cors::CorsPolicy;
pub use lifecycle::{ErrorHook, FailureHook, FireOnce, LifecycleState};
pub use server::{HttpServer, HttpServerBuilder};
