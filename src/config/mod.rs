//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → consumed once by HttpServerBuilder
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the handler tree is too
//! - All fields have defaults to allow minimal configs
//! - Runtime-only options (hooks, custom CORS handler) live on the builder,
//!   not in the file

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BodyConfig, BodyPolicy, LoggingConfig, ObservabilityConfig, ServerConfig, TlsConfig,
    TransportConfig, WebSocketConfig,
};
