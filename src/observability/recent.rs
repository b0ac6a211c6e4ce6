//! Bounded log of the most recent completed requests.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Immutable record of one completed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLogEntry {
    #[serde(rename = "fullURL")]
    pub full_url: String,
    pub status_code: u16,
    pub user_agent: String,
    pub start_time: DateTime<Utc>,
    /// Seconds.
    pub duration: f64,
    pub ip: String,
}

#[derive(Debug)]
struct Ring {
    slots: Vec<RequestLogEntry>,
    head: usize,
}

/// Fixed-capacity ring buffer; the oldest entry is overwritten when full.
#[derive(Debug)]
pub struct RecentRequestLog {
    capacity: usize,
    ring: Mutex<Ring>,
}

impl RecentRequestLog {
    /// Create a log holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ring: Mutex::new(Ring {
                slots: Vec::with_capacity(capacity),
                head: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn add(&self, entry: RequestLogEntry) {
        let mut ring = self.ring.lock().expect("recent request log mutex poisoned");
        let head = ring.head;
        if ring.slots.len() < self.capacity {
            ring.slots.push(entry);
        } else {
            ring.slots[head] = entry;
        }
        ring.head = (head + 1) % self.capacity;
    }

    /// Entries from oldest to newest.
    pub fn get_all(&self) -> Vec<RequestLogEntry> {
        let ring = self.ring.lock().expect("recent request log mutex poisoned");
        let size = ring.slots.len();
        (0..size)
            .map(|i| {
                let idx = (ring.head + self.capacity - size + i) % self.capacity;
                ring.slots[idx].clone()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ring
            .lock()
            .expect("recent request log mutex poisoned")
            .slots
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
