//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (optional TLS handshake)
//!     → Hand off to the dispatch service (http/server.rs)
//! ```
//!
//! # Design Decisions
//! - TLS is optional and handled transparently by the acceptor
//! - Missing certificate material fails startup, never a request

pub mod tls;
