//! 404-driven IP ban tracking.
//!
//! # States
//! - Clean: no ban record, 404 hit count >= 0
//! - Banned: ban record holds the ban start time
//!
//! # State Transitions
//! ```text
//! Clean → Banned: hit count exceeds threshold (hit count reset to 0)
//! Banned → Clean: ban older than ban duration, on the next check for that IP
//! Banned → Clean: unban_all
//! ```
//!
//! # Design Decisions
//! - Only 404 responses count toward a ban; request volume does not
//! - Expiry is lazy: a stale record is dropped when it is looked up
//! - `unban_all` clears ban records only, never hit or status counters
//! - One mutex guards all per-IP maps; every operation is O(1)

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::observability::metrics;

#[derive(Debug, Clone, Copy)]
struct BanRecord {
    since: Instant,
    at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct BanState {
    hits: HashMap<String, u64>,
    banned: HashMap<String, BanRecord>,
    status_counts: HashMap<String, BTreeMap<u16, u64>>,
}

/// Point-in-time copy of the tracker's per-IP tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BanSnapshot {
    pub hits: BTreeMap<String, u64>,
    pub banned: BTreeMap<String, DateTime<Utc>>,
    pub status_count_per_ip: BTreeMap<String, BTreeMap<u16, u64>>,
}

/// Per-IP 404 counter and ban state machine.
#[derive(Debug)]
pub struct IpBanTracker {
    threshold: u64,
    ban_duration: Duration,
    state: Mutex<BanState>,
}

impl IpBanTracker {
    /// Ban an IP once its 404 count exceeds `threshold`, for `ban_duration`.
    pub fn new(threshold: u64, ban_duration: Duration) -> Self {
        Self {
            threshold,
            ban_duration,
            state: Mutex::new(BanState::default()),
        }
    }

    /// Whether `ip` is currently banned. Drops the record if it has expired.
    pub fn check_ban(&self, ip: &str) -> bool {
        self.check_ban_at(ip, Instant::now())
    }

    pub(crate) fn check_ban_at(&self, ip: &str, now: Instant) -> bool {
        let mut state = self.lock();
        let Some(record) = state.banned.get(ip).copied() else {
            return false;
        };

        if now.saturating_duration_since(record.since) > self.ban_duration {
            state.banned.remove(ip);
            tracing::info!(ip = %ip, "Ban expired");
            return false;
        }
        true
    }

    /// Count a 404 for `ip`, banning it once the threshold is exceeded.
    pub fn increment_hit(&self, ip: &str) {
        let mut state = self.lock();
        let hits = state.hits.entry(ip.to_string()).or_insert(0);
        *hits += 1;

        if *hits > self.threshold {
            state.hits.remove(ip);
            state.banned.insert(
                ip.to_string(),
                BanRecord {
                    since: Instant::now(),
                    at: Utc::now(),
                },
            );
            metrics::record_ban();
            tracing::warn!(
                ip = %ip,
                threshold = self.threshold,
                ban_duration_secs = self.ban_duration.as_secs(),
                "Banned IP"
            );
        }
    }

    /// Tally a response status for `ip`. Independent of the ban decision.
    pub fn increment_status(&self, ip: &str, status: u16) {
        let mut state = self.lock();
        *state
            .status_counts
            .entry(ip.to_string())
            .or_default()
            .entry(status)
            .or_insert(0) += 1;
    }

    /// 404 hits counted for `ip` since its last ban.
    pub fn hits(&self, ip: &str) -> u64 {
        self.lock().hits.get(ip).copied().unwrap_or(0)
    }

    /// Lift every ban immediately. Hit and status counters are kept.
    pub fn unban_all(&self) {
        let mut state = self.lock();
        let lifted = state.banned.len();
        state.banned.clear();
        tracing::info!(lifted, "All IPs have been unbanned");
    }

    /// Copy of the per-IP tables for the diagnostic report.
    pub fn info(&self) -> BanSnapshot {
        let state = self.lock();
        BanSnapshot {
            hits: state.hits.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            banned: state
                .banned
                .iter()
                .map(|(k, record)| (k.clone(), record.at))
                .collect(),
            status_count_per_ip: state
                .status_counts
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BanState> {
        self.state.lock().expect("ban tracker mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IP: &str = "203.0.113.7";

    #[test]
    fn test_ban_after_threshold_exceeded() {
        let tracker = IpBanTracker::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            tracker.increment_hit(IP);
            assert!(!tracker.check_ban(IP));
        }
        assert_eq!(tracker.hits(IP), 3);

        tracker.increment_hit(IP);
        assert!(tracker.check_ban(IP));
        // Counter resets the moment the ban is issued.
        assert_eq!(tracker.hits(IP), 0);
        assert!(!tracker.info().hits.contains_key(IP));
    }

    #[test]
    fn test_zero_threshold_bans_on_first_404() {
        let tracker = IpBanTracker::new(0, Duration::from_secs(60));
        assert!(!tracker.check_ban(IP));
        tracker.increment_hit(IP);
        assert!(tracker.check_ban(IP));
    }

    #[test]
    fn test_ban_expires_lazily() {
        let tracker = IpBanTracker::new(0, Duration::from_secs(60));
        let now = Instant::now();
        tracker.increment_hit(IP);

        assert!(tracker.check_ban_at(IP, now + Duration::from_secs(59)));
        // Exactly the ban duration is still banned.
        assert!(tracker.check_ban_at(IP, now + Duration::from_secs(60)));
        assert!(tracker.info().banned.contains_key(IP));

        assert!(!tracker.check_ban_at(IP, now + Duration::from_secs(61)));
        assert!(tracker.info().banned.is_empty());
    }

    #[test]
    fn test_ban_expires_in_real_time() {
        let tracker = IpBanTracker::new(0, Duration::from_millis(20));
        tracker.increment_hit(IP);
        assert!(tracker.check_ban(IP));
        std::thread::sleep(Duration::from_millis(40));
        assert!(!tracker.check_ban(IP));
    }

    #[test]
    fn test_unbanned_ip_starts_clean() {
        let tracker = IpBanTracker::new(2, Duration::from_secs(60));
        for _ in 0..3 {
            tracker.increment_hit(IP);
        }
        assert!(tracker.check_ban(IP));
        tracker.unban_all();
        assert!(!tracker.check_ban(IP));

        // Needs another full threshold + 1 hits.
        tracker.increment_hit(IP);
        tracker.increment_hit(IP);
        assert!(!tracker.check_ban(IP));
        tracker.increment_hit(IP);
        assert!(tracker.check_ban(IP));
    }

    #[test]
    fn test_unban_all_keeps_counters() {
        let tracker = IpBanTracker::new(1, Duration::from_secs(60));
        tracker.increment_hit("10.0.0.1");
        tracker.increment_hit("10.0.0.1");
        tracker.increment_hit("10.0.0.2");
        tracker.increment_hit("10.0.0.2");
        tracker.increment_hit("10.0.0.3");
        tracker.increment_status("10.0.0.1", 404);
        tracker.increment_status("10.0.0.3", 200);

        tracker.unban_all();

        assert!(!tracker.check_ban("10.0.0.1"));
        assert!(!tracker.check_ban("10.0.0.2"));
        let info = tracker.info();
        assert!(info.banned.is_empty());
        assert_eq!(info.hits.get("10.0.0.3"), Some(&1));
        assert_eq!(info.status_count_per_ip["10.0.0.1"][&404], 1);
        assert_eq!(info.status_count_per_ip["10.0.0.3"][&200], 1);
    }

    #[test]
    fn test_status_counts_ignore_ban_state() {
        let tracker = IpBanTracker::new(0, Duration::from_secs(60));
        tracker.increment_hit(IP);
        assert!(tracker.check_ban(IP));
        tracker.increment_status(IP, 404);
        tracker.increment_status(IP, 404);
        tracker.increment_status(IP, 200);
        let info = tracker.info();
        assert_eq!(info.status_count_per_ip[IP][&404], 2);
        assert_eq!(info.status_count_per_ip[IP][&200], 1);
    }

    #[test]
    fn test_unknown_ip_is_clean() {
        let tracker = IpBanTracker::new(50, Duration::from_secs(60));
        assert!(!tracker.check_ban("198.51.100.1"));
        assert_eq!(tracker.hits("198.51.100.1"), 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let tracker = IpBanTracker::new(0, Duration::from_secs(60));
        tracker.increment_hit(IP);
        tracker.increment_status(IP, 404);
        let value = serde_json::to_value(tracker.info()).unwrap();
        assert!(value["banned"][IP].is_string());
        assert_eq!(value["statusCountPerIp"][IP]["404"], 1);
    }
}
