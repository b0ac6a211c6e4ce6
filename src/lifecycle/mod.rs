//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Child (child.rs):
//!     backend exits → Shutdown::trigger
//!     Shutdown      → kill backend
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting → drain in-flight requests → exit
//! ```

pub mod child;
pub mod shutdown;
pub mod signals;

pub use child::{BackendProcess, ChildError};
pub use shutdown::Shutdown;
