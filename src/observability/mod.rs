//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Resolver, lifecycle, finalizer, websocket gateway produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt subscriber)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID (`x-request-id`) is attached to every exchange summary
//! - Echoed params/returns are truncated to a fixed budget

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
