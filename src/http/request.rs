//! Request handling and transformation.
//!
//! # Responsibilities
//! - Resolve the configured backend into scheme, authority and base path
//! - Rewrite inbound URIs onto the backend
//! - Prepare request heads for forwarding (hop-by-hop, X-Forwarded-For, Host)
//!
//! # Design Decisions
//! - Bodies are streamed through untouched; only the head is rewritten
//! - The inbound `Host` header is kept unless `modify_host` is set

use std::net::SocketAddr;

use axum::http::{
    header,
    request::Parts,
    uri::{Authority, PathAndQuery, Scheme},
    HeaderValue, Uri, Version,
};
use url::Url;

use crate::security::headers::{append_forwarded_for, strip_hop_by_hop};

pub use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Error resolving or applying the backend address.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("invalid backend URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("cannot build upstream URI: {0}")]
    Uri(#[from] axum::http::Error),
}

/// The backend every request is forwarded to.
#[derive(Debug, Clone)]
pub struct Upstream {
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    base_query: Option<String>,
}

impl Upstream {
    /// Parse an absolute `http://host[:port][/base][?query]` URL.
    pub fn parse(url: &str) -> Result<Self, UpstreamError> {
        let invalid = |reason: &str| UpstreamError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        let scheme = match parsed.scheme() {
            "http" => Scheme::HTTP,
            _ => return Err(invalid("only http backends are supported")),
        };
        let host = parsed.host_str().ok_or_else(|| invalid("missing host"))?;
        let authority = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority = Authority::try_from(authority.as_str()).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            scheme,
            authority,
            base_path: parsed.path().to_string(),
            base_query: parsed.query().map(str::to_string).filter(|q| !q.is_empty()),
        })
    }

    /// Map an inbound URI onto the backend, joining the base path in front.
    pub fn rewrite_uri(&self, inbound: &Uri) -> Result<Uri, UpstreamError> {
        let path = join_paths(&self.base_path, inbound.path());
        let query = match (self.base_query.as_deref(), inbound.query()) {
            (Some(base), Some(extra)) if !extra.is_empty() => Some(format!("{base}&{extra}")),
            (Some(base), _) => Some(base.to_string()),
            (None, Some(extra)) if !extra.is_empty() => Some(extra.to_string()),
            (None, _) => None,
        };
        let path_and_query = match query {
            Some(q) => format!("{path}?{q}"),
            None => path,
        };

        let uri = Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(PathAndQuery::try_from(path_and_query.as_str()).map_err(axum::http::Error::from)?)
            .build()?;
        Ok(uri)
    }

    /// Rewrite a request head in place for forwarding.
    pub fn prepare(&self, parts: &mut Parts, peer: SocketAddr, modify_host: bool) -> Result<(), UpstreamError> {
        parts.uri = self.rewrite_uri(&parts.uri)?;
        // The pooled client speaks HTTP/1.1 to the backend.
        parts.version = Version::HTTP_11;

        strip_hop_by_hop(&mut parts.headers);
        append_forwarded_for(&mut parts.headers, peer);

        if modify_host || !parts.headers.contains_key(header::HOST) {
            if let Ok(host) = HeaderValue::from_str(self.authority.as_str()) {
                parts.headers.insert(header::HOST, host);
            }
        }
        Ok(())
    }
}

/// Join two URL paths with exactly one slash between them.
fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}
