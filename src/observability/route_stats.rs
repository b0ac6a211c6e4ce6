//! Per-route latency/status statistics.
//!
//! # Responsibilities
//! - Own one `BucketHistogram` per normalized route key
//! - Create histograms lazily, at most once per key
//! - Produce per-route summaries for the diagnostic report

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::observability::histogram::{BucketBounds, BucketHistogram, Percentiles};

/// Summary of one route's histogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    #[serde(flatten)]
    pub percentiles: Percentiles,
    pub counts: Vec<u64>,
    pub total_count: u64,
    pub total_time: f64,
    pub status_count: BTreeMap<u16, u64>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Registry of histograms keyed by route.
#[derive(Debug)]
pub struct RouteStatsRegistry {
    bounds: BucketBounds,
    routes: DashMap<String, Arc<BucketHistogram>>,
}

impl RouteStatsRegistry {
    pub fn new(bounds: BucketBounds) -> Self {
        Self {
            bounds,
            routes: DashMap::new(),
        }
    }

    /// Histogram for `route`, created on first use.
    ///
    /// Concurrent first calls for the same key all receive the same instance.
    pub fn stats_for(&self, route: &str) -> Arc<BucketHistogram> {
        if let Some(existing) = self.routes.get(route) {
            return existing.value().clone();
        }
        self.routes
            .entry(route.to_string())
            .or_insert_with(|| Arc::new(BucketHistogram::new(self.bounds.clone())))
            .value()
            .clone()
    }

    /// Number of distinct routes observed.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Summaries of every known route, sorted by key.
    ///
    /// Each route is read under its own lock; other routes may change during
    /// the walk.
    pub fn all_summaries(&self) -> BTreeMap<String, RouteSummary> {
        let histograms: Vec<(String, Arc<BucketHistogram>)> = self
            .routes
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        histograms
            .into_iter()
            .map(|(route, histogram)| {
                let (snapshot, percentiles) = histogram.summarize();
                let summary = RouteSummary {
                    percentiles,
                    counts: snapshot.bucket_counts,
                    total_count: snapshot.total_count,
                    total_time: snapshot.total_time,
                    status_count: snapshot.status_counts,
                    first_seen: snapshot.first_seen,
                    last_seen: snapshot.last_seen,
                };
                (route, summary)
            })
            .collect()
    }
}
