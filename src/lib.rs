//! Convention-routed HTTP/WebSocket dispatch.
//!
//! Handlers are registered by name (`getProfile`, `post_rename`, `wsChat`)
//! inside nested groups. The leading word is the HTTP method, the rest is
//! the path: `user.getProfileInfo` answers `GET /user/profileinfo`,
//! `/user/profile_info` and `/user/profile/info`.
//!
//! ```text
//! request ─▶ http::server ─▶ routing::resolver ─▶ http::lifecycle ─▶ handler
//!                 │                                      │
//!                 └──▶ http::websocket ─▶ socket handler  └──▶ http::finalize
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod registry;
pub mod routing;

pub use config::ServerConfig;
pub use error::{BoxError, RegistryError, RouterError};
pub use http::{CorsPolicy, HandlerContext, HttpServer};
pub use lifecycle::Shutdown;
pub use registry::{Args, Handler, HandlerTree, Outcome, TreeBuilder};
