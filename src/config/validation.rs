//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds, durations, capacities)
//! - Check bucket bounds are usable by the histograms
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),
    #[error("backend.url `{0}` must be an absolute http URL with a host")]
    BackendUrl(String),
    #[error("backend.request_timeout_secs must be greater than 0")]
    RequestTimeout,
    #[error("ban.duration_secs must be greater than 0")]
    BanDuration,
    #[error("stats.bucket_bounds must not be empty")]
    EmptyBuckets,
    #[error("stats.bucket_bounds[{index}] = {value} must be finite and positive")]
    InvalidBucket { index: usize, value: f64 },
    #[error("stats.bucket_bounds must be strictly ascending (index {0})")]
    UnorderedBuckets(usize),
    #[error("stats.recent_capacity must be at least 1")]
    RecentCapacity,
    #[error("admin.path_prefix `{0}` must start with `/` and not end with `/`")]
    AdminPrefix(String),
    #[error("admin.username must not be empty")]
    AdminUsername,
    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let backend_ok = Url::parse(&config.backend.url)
        .map(|u| u.scheme() == "http" && u.host_str().is_some())
        .unwrap_or(false);
    if !backend_ok {
        errors.push(ValidationError::BackendUrl(config.backend.url.clone()));
    }
    if config.backend.request_timeout_secs == 0 {
        errors.push(ValidationError::RequestTimeout);
    }

    if config.ban.enabled {
        if config.ban.duration_secs == 0 {
            errors.push(ValidationError::BanDuration);
        }
    }

    let bounds = &config.stats.bucket_bounds;
    if bounds.is_empty() {
        errors.push(ValidationError::EmptyBuckets);
    }
    for (index, &value) in bounds.iter().enumerate() {
        if !value.is_finite() || value <= 0.0 {
            errors.push(ValidationError::InvalidBucket { index, value });
        }
    }
    for (index, pair) in bounds.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            errors.push(ValidationError::UnorderedBuckets(index + 1));
        }
    }
    if config.stats.recent_capacity == 0 {
        errors.push(ValidationError::RecentCapacity);
    }

    if config.admin.enabled {
        let prefix = &config.admin.path_prefix;
        if !prefix.starts_with('/') || prefix.ends_with('/') {
            errors.push(ValidationError::AdminPrefix(prefix.clone()));
        }
        if config.admin.username.is_empty() {
            errors.push(ValidationError::AdminUsername);
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
