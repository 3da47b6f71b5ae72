//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → resolver.rs (normalize, pick strategy)
//!         → mapping.rs (fast mapping: flat table lookup)
//!         → or tree walk over the HandlerTree
//!     → Return: Arc<Handler> or miss (OPTIONS → CORS fallback)
//!
//! Route Compilation (at startup, static mapping only):
//!     HandlerTree
//!     → naming.rs (split names into method + words)
//!     → every join style per leaf
//!     → Freeze as immutable FastMappingTable
//! ```
//!
//! # Design Decisions
//! - Routes derived from handler names, never declared as paths
//! - Compiled at startup, immutable at runtime
//! - Deterministic: same input always resolves to the same handler

pub mod mapping;
pub mod naming;
pub mod resolver;

pub use mapping::FastMappingTable;
pub use resolver::{PathResolver, WS_METHOD};
