//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (raw path)
//!     → normalize.rs (collapse dynamic segments into `{id}`)
//!     → route key shared by route stats, connection gauges and the report
//! ```
//!
//! # Design Decisions
//! - Patterns compiled once at startup, immutable at runtime
//! - Deterministic: same path always yields the same route key
//! - Route keys are never removed; their count is bounded by distinct routes

pub mod normalize;

pub use normalize::{NormalizerError, PathNormalizer, ID_PLACEHOLDER};
