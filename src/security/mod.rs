//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (derive client IP)
//!     → ban.rs (reject banned IPs with 403 before the backend is called)
//!     → Pass to proxy
//!
//! Backend response:
//!     → ban.rs (count 404s, tally status per IP)
//! ```
//!
//! # Design Decisions
//! - Only 404 volume leads to a ban; legitimate traffic is never throttled
//! - Bans are time bounded and expire lazily
//! - State is per process and lost on restart

pub mod ban;
pub mod headers;

pub use ban::{BanSnapshot, IpBanTracker};
