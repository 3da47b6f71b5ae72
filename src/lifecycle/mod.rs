//! Process lifecycle.
//!
//! # Data Flow
//! ```text
//! Ctrl+C (shutdown.rs) → Shutdown::trigger
//!     → server stops accepting
//!     → in-flight exchanges drain up to the grace period
//!     → exit
//! ```

pub mod shutdown;

pub use shutdown::{wait_for_ctrl_c, Shutdown};
