//! Network-level bookkeeping.
//!
//! # Data Flow
//! ```text
//! Admitted request (route key known)
//!     → connection.rs (per-route gauge, begin)
//!     → proxied to backend
//!     → guard dropped (end), on success, error or cancellation
//! ```
//!
//! # Design Decisions
//! - Each in-flight request is tracked per route for the diagnostic report
//! - Counters are atomics; no lock is held across the backend call

pub mod connection;

pub use connection::{ActiveConnectionRegistry, ConnectionGauge, ConnectionGuard};
