//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, admin API vs. catch-all proxy)
//!     → instrument.rs (admission, route key, connection gauge)
//!     → request.rs (rewrite URI and headers onto the backend)
//!     → backend response
//!     → instrument.rs (histograms, ban hits, recent log)
//!     → Send to client
//! ```

pub mod instrument;
pub mod request;
pub mod server;

pub use instrument::{Admission, InFlight, Instrumentation, RequestInfo};
pub use request::{Upstream, UpstreamError};
pub use server::{AppState, HttpServer, ServerError};
