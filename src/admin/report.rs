//! Diagnostic report assembly.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::admin::system::{self, SystemInfo};
use crate::http::instrument::Instrumentation;
use crate::observability::histogram::Percentiles;
use crate::observability::recent::RequestLogEntry;
use crate::observability::route_stats::RouteSummary;
use crate::security::ban::BanSnapshot;

/// Process-wide latency summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSummary {
    pub buckets: Vec<f64>,
    pub bucket_counts: Vec<u64>,
    #[serde(flatten)]
    pub percentiles: Percentiles,
    pub total_count: u64,
    pub total_time: f64,
    pub status_count: BTreeMap<u16, u64>,
}

/// One route's summary joined with its connection gauge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteReport {
    #[serde(flatten)]
    pub summary: RouteSummary,
    pub active_connections: i64,
    pub max_active_connections: i64,
}

/// Everything the diagnostic API exposes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    #[serde(flatten)]
    pub bans: BanSnapshot,
    pub ban_enabled: bool,
    pub percentiles: GlobalSummary,
    pub by_path: BTreeMap<String, RouteReport>,
    pub last_requests: Vec<RequestLogEntry>,
    pub system: SystemInfo,
}

impl DiagnosticReport {
    /// Snapshot every registry. Each registry is read under its own lock.
    pub fn collect(instr: &Instrumentation) -> Self {
        let (snapshot, percentiles) = instr.global().summarize();
        let percentiles = GlobalSummary {
            buckets: instr.global().bounds().to_vec(),
            bucket_counts: snapshot.bucket_counts,
            percentiles,
            total_count: snapshot.total_count,
            total_time: snapshot.total_time,
            status_count: snapshot.status_counts,
        };

        let connections = instr.connections();
        let by_path = instr
            .routes()
            .all_summaries()
            .into_iter()
            .map(|(route, summary)| {
                let report = RouteReport {
                    active_connections: connections.current(&route),
                    max_active_connections: connections.max(&route),
                    summary,
                };
                (route, report)
            })
            .collect();

        Self {
            bans: instr.bans().info(),
            ban_enabled: instr.ban_enabled(),
            percentiles,
            by_path,
            last_requests: instr.recent().get_all(),
            system: system::collect(),
        }
    }
}
