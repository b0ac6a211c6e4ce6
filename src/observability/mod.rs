//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Completed request (route key, status, duration):
//!     → histogram.rs (process-wide BucketHistogram)
//!     → route_stats.rs (per-route BucketHistogram)
//!     → recent.rs (bounded recent-request ring)
//!     → metrics.rs (Prometheus mirror, optional)
//!     → logging.rs (structured access log events)
//!
//! Consumers:
//!     → admin diagnostic report
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Bucketed approximation instead of exact percentiles
//! - Each registry owns its own lock; no lock spans two registries
//! - Readers get point-in-time copies, staleness across routes is accepted

pub mod histogram;
pub mod logging;
pub mod metrics;
pub mod recent;
pub mod route_stats;

pub use histogram::{BucketBounds, BucketHistogram, HistogramSnapshot, Percentiles};
pub use recent::{RecentRequestLog, RequestLogEntry};
pub use route_stats::{RouteStatsRegistry, RouteSummary};
