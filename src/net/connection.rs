//! Per-route in-flight request tracking.
//!
//! # Responsibilities
//! - Track current in-flight requests per route key
//! - Keep a high-water mark of concurrent requests per route
//! - Release the slot on every exit path through an RAII guard
//!
//! # Design Decisions
//! - Lock-free counters: `fetch_add`/`fetch_sub` plus a CAS loop for the max
//! - Gauges are created lazily through the map's entry API and never removed
//! - `Drop` on the guard is the only way to end a request, so cancelled or
//!   panicking handlers cannot leak the gauge upward

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::observability::metrics;

/// Current and maximum concurrent requests for one route.
#[derive(Debug)]
pub struct ConnectionGauge {
    route: String,
    current: AtomicI64,
    max: AtomicI64,
}

impl ConnectionGauge {
    fn new(route: &str) -> Self {
        Self {
            route: route.to_string(),
            current: AtomicI64::new(0),
            max: AtomicI64::new(0),
        }
    }

    /// The route key this gauge counts.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Requests in flight right now.
    pub fn current(&self) -> i64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Highest concurrency observed since startup.
    pub fn max(&self) -> i64 {
        self.max.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;

        // Raise the high-water mark; retry while another thread moved it
        // but our count is still higher.
        let mut seen = self.max.load(Ordering::SeqCst);
        while now > seen {
            match self
                .max
                .compare_exchange_weak(seen, now, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => break,
                Err(actual) => seen = actual,
            }
        }
        metrics::record_active_connections(&self.route, now);
    }

    fn leave(&self) {
        let now = self.current.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::record_active_connections(&self.route, now);
    }
}

/// Registry of connection gauges keyed by route.
#[derive(Debug, Default)]
pub struct ActiveConnectionRegistry {
    gauges: DashMap<String, Arc<ConnectionGauge>>,
}

impl ActiveConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a request on `route` as started. The returned guard ends it on drop.
    pub fn begin(&self, route: &str) -> ConnectionGuard {
        let gauge = self.gauge(route);
        gauge.enter();
        tracing::trace!(route = %route, current = gauge.current(), "Request started");
        ConnectionGuard { gauge }
    }

    /// In-flight requests for `route`; 0 for an unknown route.
    pub fn current(&self, route: &str) -> i64 {
        self.gauges.get(route).map_or(0, |g| g.current())
    }

    /// High-water mark for `route`; 0 for an unknown route.
    pub fn max(&self, route: &str) -> i64 {
        self.gauges.get(route).map_or(0, |g| g.max())
    }

    /// `(current, max)` for every known route.
    pub fn all(&self) -> Vec<(String, i64, i64)> {
        self.gauges
            .iter()
            .map(|entry| (entry.key().clone(), entry.current(), entry.max()))
            .collect()
    }

    fn gauge(&self, route: &str) -> Arc<ConnectionGauge> {
        if let Some(existing) = self.gauges.get(route) {
            return existing.value().clone();
        }
        self.gauges
            .entry(route.to_string())
            .or_insert_with(|| Arc::new(ConnectionGauge::new(route)))
            .value()
            .clone()
    }
}

/// Guard that tracks one in-flight request.
/// Decrements the route's current count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    gauge: Arc<ConnectionGauge>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.gauge.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_and_end() {
        let registry = ActiveConnectionRegistry::new();
        assert_eq!(registry.current("/a"), 0);

        let g1 = registry.begin("/a");
        assert_eq!(registry.current("/a"), 1);

        let g2 = registry.begin("/a");
        assert_eq!(registry.current("/a"), 2);
        assert_eq!(registry.max("/a"), 2);

        drop(g1);
        assert_eq!(registry.current("/a"), 1);

        drop(g2);
        assert_eq!(registry.current("/a"), 0);
        assert_eq!(registry.max("/a"), 2);
    }

    #[test]
    fn test_max_tracks_true_peak() {
        let registry = ActiveConnectionRegistry::new();
        let mut open = Vec::new();
        let mut peak = 0;
        // Open/close pattern: +3, -2, +4, -5
        for step in [3i64, -2, 4, -5] {
            if step > 0 {
                for _ in 0..step {
                    open.push(registry.begin("/r"));
                }
            } else {
                for _ in 0..(-step) {
                    open.pop();
                }
            }
            peak = peak.max(open.len() as i64);
            assert!(registry.current("/r") >= 0);
            assert_eq!(registry.current("/r"), open.len() as i64);
            assert_eq!(registry.max("/r"), peak);
        }
        assert_eq!(registry.max("/r"), 5);
    }

    #[test]
    fn test_routes_are_independent() {
        let registry = ActiveConnectionRegistry::new();
        let _a = registry.begin("/a");
        let _b1 = registry.begin("/b");
        let _b2 = registry.begin("/b");
        assert_eq!(registry.current("/a"), 1);
        assert_eq!(registry.current("/b"), 2);
        assert_eq!(registry.all().len(), 2);
    }

    #[test]
    fn test_guard_released_on_panic() {
        let registry = Arc::new(ActiveConnectionRegistry::new());
        let r = registry.clone();
        let result = std::thread::spawn(move || {
            let _guard = r.begin("/boom");
            panic!("handler failed");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(registry.current("/boom"), 0);
        assert_eq!(registry.max("/boom"), 1);
    }

    #[test]
    fn test_concurrent_begin_end() {
        let registry = Arc::new(ActiveConnectionRegistry::new());
        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let guard = registry.begin("/hot");
                    barrier.wait();
                    drop(guard);
                    for _ in 0..500 {
                        let _g = registry.begin("/hot");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.current("/hot"), 0);
        // All eight were open at the barrier.
        assert_eq!(registry.max("/hot"), 8);
    }
}
