//! Per-request instrumentation and admission control.
//!
//! # Responsibilities
//! - Decide whether a client IP is admitted (403 when banned)
//! - Normalize the request path into a route key
//! - Bracket the backend call with a connection-gauge guard
//! - Fan the outcome out to histograms, ban tracker and recent log
//!
//! # Design Decisions
//! - Owns no state of its own beyond the registries it wires together
//! - Registries are updated one at a time; no cross-registry atomicity
//! - An `InFlight` dropped without `complete` (backend error, cancelled
//!   request) still releases its gauge slot and records nothing else

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::config::ProxyConfig;
use crate::net::connection::{ActiveConnectionRegistry, ConnectionGuard};
use crate::observability::histogram::{BucketBounds, BucketHistogram};
use crate::observability::metrics;
use crate::observability::recent::{RecentRequestLog, RequestLogEntry};
use crate::observability::route_stats::RouteStatsRegistry;
use crate::routing::normalize::PathNormalizer;
use crate::security::ban::IpBanTracker;

/// Admission decision for an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Reply 403 without calling the backend.
    Banned,
}

/// What the instrumentation needs to know about a request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub ip: String,
    pub method: String,
    /// Path and query as received.
    pub full_url: String,
    /// Raw path, before normalization.
    pub path: String,
    pub user_agent: String,
}

/// Wires the registries together around each proxied request.
#[derive(Debug)]
pub struct Instrumentation {
    normalizer: PathNormalizer,
    bans: IpBanTracker,
    global: BucketHistogram,
    routes: RouteStatsRegistry,
    connections: ActiveConnectionRegistry,
    recent: RecentRequestLog,
    ban_enabled: bool,
}

impl Instrumentation {
    pub fn new(
        normalizer: PathNormalizer,
        bans: IpBanTracker,
        bounds: BucketBounds,
        recent_capacity: usize,
        ban_enabled: bool,
    ) -> Self {
        Self {
            normalizer,
            bans,
            global: BucketHistogram::new(bounds.clone()),
            routes: RouteStatsRegistry::new(bounds),
            connections: ActiveConnectionRegistry::new(),
            recent: RecentRequestLog::new(recent_capacity),
            ban_enabled,
        }
    }

    /// Build from a validated configuration.
    pub fn from_config(config: &ProxyConfig, normalizer: PathNormalizer) -> Self {
        Self::new(
            normalizer,
            IpBanTracker::new(config.ban.hit_404_threshold, config.ban.duration()),
            BucketBounds::from(config.stats.bucket_bounds.clone()),
            config.stats.recent_capacity,
            config.ban.enabled,
        )
    }

    /// Check `ip` against the ban list. Only enforced when banning is enabled.
    pub fn admit(&self, ip: &str) -> Admission {
        if self.ban_enabled && self.bans.check_ban(ip) {
            metrics::record_blocked();
            return Admission::Banned;
        }
        Admission::Allowed
    }

    /// Start tracking an admitted request.
    pub fn begin(self: &Arc<Self>, info: RequestInfo) -> InFlight {
        let route = self.normalizer.normalize(&info.path);
        let guard = self.connections.begin(&route);
        InFlight {
            instrumentation: Arc::clone(self),
            route,
            info,
            started: Instant::now(),
            started_at: Utc::now(),
            _guard: guard,
        }
    }

    pub fn ban_enabled(&self) -> bool {
        self.ban_enabled
    }

    pub fn bans(&self) -> &IpBanTracker {
        &self.bans
    }

    /// Process-wide histogram.
    pub fn global(&self) -> &BucketHistogram {
        &self.global
    }

    pub fn routes(&self) -> &RouteStatsRegistry {
        &self.routes
    }

    pub fn connections(&self) -> &ActiveConnectionRegistry {
        &self.connections
    }

    pub fn recent(&self) -> &RecentRequestLog {
        &self.recent
    }
}

/// A request between admission and response.
///
/// Holds the route's connection-gauge slot until dropped.
#[derive(Debug)]
pub struct InFlight {
    instrumentation: Arc<Instrumentation>,
    route: String,
    info: RequestInfo,
    started: Instant,
    started_at: DateTime<Utc>,
    _guard: ConnectionGuard,
}

impl InFlight {
    /// Normalized route key of this request.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Record the backend's response status and release the gauge slot.
    pub fn complete(self, status: u16) {
        let duration = self.started.elapsed().as_secs_f64();
        let instr = &self.instrumentation;
        let ip = self.info.ip.as_str();

        if status == 404 {
            instr.bans.increment_hit(ip);
        }
        instr.bans.increment_status(ip, status);

        instr.routes.stats_for(&self.route).record(duration, status);
        instr.global.record(duration, status);
        metrics::record_request(&self.route, status, duration);

        tracing::info!(
            method = %self.info.method,
            url = %self.info.full_url,
            route = %self.route,
            ip = %ip,
            hits = instr.bans.hits(ip),
            status,
            duration_secs = duration,
            "Access log"
        );

        instr.recent.add(RequestLogEntry {
            full_url: self.info.full_url.clone(),
            status_code: status,
            user_agent: self.info.user_agent.clone(),
            start_time: self.started_at,
            duration,
            ip: self.info.ip.clone(),
        });
    }
}
