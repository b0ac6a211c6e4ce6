//! Bucketed latency/status histogram.
//!
//! # Responsibilities
//! - Count calls into a fixed, shared, ascending set of upper bounds
//! - Keep running totals (calls, seconds) and a status-code tally
//! - Answer approximate percentiles in one pass over the buckets
//!
//! # Design Decisions
//! - One mutex per histogram guards both record and read paths
//! - Durations beyond the largest bound are counted in the totals only; the
//!   trailing overflow counter is never incremented by `record`, so
//!   `total_count` may exceed the sum of `bucket_counts`
//! - A percentile whose threshold is never reached by the real buckets
//!   reports `largest bound + 1`

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Percentiles reported for every histogram.
pub const REPORTED_PERCENTILES: [f64; 5] = [50.0, 90.0, 95.0, 98.0, 99.0];

/// Shared, immutable, ascending bucket upper bounds (seconds).
pub type BucketBounds = Arc<[f64]>;

/// Point-in-time copy of a histogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramSnapshot {
    /// N + 1 counters, the last one being the overflow bucket.
    pub bucket_counts: Vec<u64>,
    pub total_count: u64,
    /// Sum of recorded durations in seconds.
    pub total_time: f64,
    pub status_counts: BTreeMap<u16, u64>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// The five reported percentiles, keyed the way the diagnostic report shows them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentiles {
    #[serde(rename = "50")]
    pub p50: f64,
    #[serde(rename = "90")]
    pub p90: f64,
    #[serde(rename = "95")]
    pub p95: f64,
    #[serde(rename = "98")]
    pub p98: f64,
    #[serde(rename = "99")]
    pub p99: f64,
}

#[derive(Debug)]
struct HistogramState {
    bucket_counts: Vec<u64>,
    total_count: u64,
    total_time: f64,
    status_counts: BTreeMap<u16, u64>,
    first_seen: DateTime<Utc>,
    last_seen: Option<DateTime<Utc>>,
}

/// Concurrency-safe online histogram over shared bucket bounds.
#[derive(Debug)]
pub struct BucketHistogram {
    bounds: BucketBounds,
    state: Mutex<HistogramState>,
}

impl BucketHistogram {
    /// Create an empty histogram. `first_seen` is the creation time.
    pub fn new(bounds: BucketBounds) -> Self {
        let counters = bounds.len() + 1;
        Self {
            bounds,
            state: Mutex::new(HistogramState {
                bucket_counts: vec![0; counters],
                total_count: 0,
                total_time: 0.0,
                status_counts: BTreeMap::new(),
                first_seen: Utc::now(),
                last_seen: None,
            }),
        }
    }

    /// The bucket upper bounds this histogram counts into.
    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// Record one call of `duration` seconds that finished with `status`.
    pub fn record(&self, duration: f64, status: u16) {
        let mut state = self.lock();
        state.total_time += duration;
        state.total_count += 1;
        state.last_seen = Some(Utc::now());
        *state.status_counts.entry(status).or_insert(0) += 1;

        if let Some(idx) = self.bounds.iter().position(|&bound| duration <= bound) {
            state.bucket_counts[idx] += 1;
        }
    }

    /// Approximate value at percentile `p` (0-100).
    pub fn percentile(&self, p: f64) -> f64 {
        let state = self.lock();
        percentile_of(&self.bounds, &state.bucket_counts, state.total_count, p)
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> HistogramSnapshot {
        let state = self.lock();
        HistogramSnapshot {
            bucket_counts: state.bucket_counts.clone(),
            total_count: state.total_count,
            total_time: state.total_time,
            status_counts: state.status_counts.clone(),
            first_seen: state.first_seen,
            last_seen: state.last_seen,
        }
    }

    /// Snapshot plus the reported percentiles computed from it.
    pub fn summarize(&self) -> (HistogramSnapshot, Percentiles) {
        let snapshot = self.snapshot();
        let percentiles = snapshot.percentiles(&self.bounds);
        (snapshot, percentiles)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HistogramState> {
        self.state.lock().expect("histogram mutex poisoned")
    }
}

impl HistogramSnapshot {
    /// Approximate value at percentile `p` for this snapshot.
    pub fn percentile(&self, bounds: &[f64], p: f64) -> f64 {
        percentile_of(bounds, &self.bucket_counts, self.total_count, p)
    }

    /// The reported percentiles (50/90/95/98/99).
    pub fn percentiles(&self, bounds: &[f64]) -> Percentiles {
        let [p50, p90, p95, p98, p99] = REPORTED_PERCENTILES.map(|p| self.percentile(bounds, p));
        Percentiles {
            p50,
            p90,
            p95,
            p98,
            p99,
        }
    }
}

fn percentile_of(bounds: &[f64], counts: &[u64], total: u64, p: f64) -> f64 {
    if total == 0 {
        return 0.0;
    }

    let threshold = (p / 100.0 * total as f64).ceil() as u64;
    let mut cumulative = 0;
    for (bound, count) in bounds.iter().zip(counts) {
        cumulative += count;
        if cumulative >= threshold {
            return *bound;
        }
    }

    bounds.last().map_or(0.0, |largest| largest + 1.0)
}
