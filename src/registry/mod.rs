//! Handler registry subsystem.
//!
//! # Data Flow
//! ```text
//! Application code
//!     → handler.rs (Handler::http / Handler::socket, declared params)
//!     → tree.rs (TreeBuilder → validated, compact-keyed HandlerTree)
//!     → signature.rs (ordered parameter names, memoized per handler)
//! ```

pub mod handler;
pub mod signature;
pub mod tree;

pub use handler::{Args, Handler, HandlerKind, HandlerResult, HttpHandler, Outcome, SocketHandler};
pub use tree::{Group, HandlerTree, RouteNode, TreeBuilder, CORS_KEY};
