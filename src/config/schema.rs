//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default histogram bucket upper bounds, in seconds.
pub const DEFAULT_BUCKET_BOUNDS: [f64; 12] = [
    0.1, 0.2, 0.4, 0.8, 1.6, 3.2, 6.4, 12.8, 25.6, 51.12, 102.4, 204.8,
];

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single backend every request is forwarded to.
    pub backend: BackendConfig,

    /// 404-driven IP banning.
    pub ban: BanConfig,

    /// Latency histograms and the recent-request log.
    pub stats: StatsConfig,

    /// Diagnostic API.
    pub admin: AdminConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend (e.g., "http://localhost:8080").
    pub url: String,

    /// Rewrite the `Host` header to the backend's authority.
    pub modify_host: bool,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            modify_host: false,
            request_timeout_secs: 60,
        }
    }
}

/// Ban configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BanConfig {
    /// Reject banned IPs. When false, bans are still tracked but not enforced.
    pub enabled: bool,

    /// Number of 404 responses an IP may receive before it is banned.
    pub hit_404_threshold: u64,

    /// Ban length in seconds.
    pub duration_secs: u64,
}

impl BanConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

impl Default for BanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hit_404_threshold: 50,
            duration_secs: 60,
        }
    }
}

/// Statistics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Ascending histogram bucket upper bounds, in seconds.
    pub bucket_bounds: Vec<f64>,

    /// Number of recent requests kept for the report.
    pub recent_capacity: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            bucket_bounds: DEFAULT_BUCKET_BOUNDS.to_vec(),
            recent_capacity: 50,
        }
    }
}

/// Diagnostic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the diagnostic API.
    pub enabled: bool,

    /// Basic auth user name.
    pub username: String,

    /// Basic auth password. Generated at startup when empty.
    pub password: String,

    /// Path prefix the API is mounted under; never proxied.
    pub path_prefix: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            username: "admin".to_string(),
            password: String::new(),
            path_prefix: "/__banme".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
