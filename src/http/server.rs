//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: diagnostic API plus the catch-all proxy
//! - Wire up middleware (timeout, request ID, tracing)
//! - Admit or reject each client against the ban list
//! - Forward admitted requests to the backend and instrument the outcome
//!
//! # Data Flow
//! ```text
//! client ─▶ client_ip ─▶ admit ──banned──▶ 403
//!                          │
//!                          ▼
//!                begin (route key, gauge +1)
//!                          │
//!                          ▼
//!              prepare head ─▶ backend ──error──▶ 502 (not recorded)
//!                          │
//!                          ▼
//!        complete(status) ─▶ histograms, ban hits, recent log
//! ```

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::config::ProxyConfig;
use crate::http::instrument::{Admission, Instrumentation, RequestInfo};
use crate::http::request::{
    MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer, Upstream, UpstreamError,
};
use crate::routing::normalize::{NormalizerError, PathNormalizer};
use crate::security::headers::{client_ip, strip_hop_by_hop};

/// Error raised while assembling or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Normalizer(#[from] NormalizerError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into the proxy handler.
#[derive(Clone)]
pub struct AppState {
    pub instrumentation: Arc<Instrumentation>,
    pub client: Client<HttpConnector, Body>,
    pub upstream: Arc<Upstream>,
    pub modify_host: bool,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    instrumentation: Arc<Instrumentation>,
}

impl HttpServer {
    /// Create a new HTTP server from a validated configuration.
    ///
    /// Generates the admin password when none was configured.
    pub fn new(mut config: ProxyConfig) -> Result<Self, ServerError> {
        if config.admin.enabled && config.admin.password.is_empty() {
            config.admin.password = uuid::Uuid::new_v4().to_string();
            tracing::warn!(
                username = %config.admin.username,
                password = %config.admin.password,
                "No admin password configured, generated one"
            );
        }

        let normalizer = PathNormalizer::new()?;
        let upstream = Arc::new(Upstream::parse(&config.backend.url)?);
        let instrumentation = Arc::new(Instrumentation::from_config(&config, normalizer));

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            instrumentation: Arc::clone(&instrumentation),
            client,
            upstream,
            modify_host: config.backend.modify_host,
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            instrumentation,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let instrumentation = Arc::clone(&state.instrumentation);
        let mut router = Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state);
        if config.admin.enabled {
            router = router.merge(setup_admin_router(&config.admin, instrumentation));
        }

        router
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.backend.request_timeout_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = %self.config.backend.url,
            "HTTP server starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router, for driving the server without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn instrumentation(&self) -> &Arc<Instrumentation> {
        &self.instrumentation
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Main proxy handler.
/// Admits the client, forwards the request and records the outcome.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let ip = client_ip(request.headers(), peer);

    if state.instrumentation.admit(&ip) == Admission::Banned {
        tracing::info!(
            method = %request.method(),
            url = %request.uri(),
            ip = %ip,
            blocked = true,
            "Access log"
        );
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    let uri = request.uri();
    let info = RequestInfo {
        ip,
        method: request.method().to_string(),
        full_url: uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string()),
        path: uri.path().to_string(),
        user_agent: request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
    };
    let in_flight = state.instrumentation.begin(info);

    let (mut parts, body) = request.into_parts();
    if let Err(e) = state.upstream.prepare(&mut parts, peer, state.modify_host) {
        tracing::error!(route = %in_flight.route(), error = %e, "Cannot build upstream request");
        return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
    }

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            in_flight.complete(response.status().as_u16());

            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(route = %in_flight.route(), error = %e, "Upstream error");
            drop(in_flight);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::connect_info::MockConnectInfo;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        // Nothing listens on the discard port.
        config.backend.url = "http://127.0.0.1:9".to_string();
        config.admin.password = "secret".to_string();
        config.ban.hit_404_threshold = 1;
        config
    }

    fn router(server: &HttpServer) -> Router {
        server
            .router()
            .layer(MockConnectInfo(SocketAddr::from(([10, 0, 0, 7], 4000))))
    }

    fn authorized(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(
                header::AUTHORIZATION,
                format!("Basic {}", STANDARD.encode("admin:secret")),
            )
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_generates_admin_password() {
        let mut cfg = config();
        cfg.admin.password.clear();
        let server = HttpServer::new(cfg).unwrap();
        assert_eq!(server.config().admin.password.len(), 36);
    }

    #[test]
    fn test_rejects_bad_backend() {
        let mut cfg = config();
        cfg.backend.url = "ftp://example.com".to_string();
        assert!(matches!(
            HttpServer::new(cfg),
            Err(ServerError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_requires_auth() {
        let server = HttpServer::new(config()).unwrap();
        let response = router(&server)
            .oneshot(
                Request::builder()
                    .uri("/__banme/api/info")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn test_admin_info_and_unknown_api() {
        let server = HttpServer::new(config()).unwrap();

        let response = router(&server)
            .oneshot(authorized("/__banme/api/info"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["percentiles"]["buckets"].is_array());

        let response = router(&server)
            .oneshot(authorized("/__banme/api/nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_banned_client_gets_403() {
        let server = HttpServer::new(config()).unwrap();
        let bans = server.instrumentation().bans();
        bans.increment_hit("10.0.0.7");
        bans.increment_hit("10.0.0.7");
        assert!(bans.check_ban("10.0.0.7"));

        let response = router(&server)
            .oneshot(Request::builder().uri("/anything").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(server.instrumentation().global().snapshot().total_count, 0);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_502_and_unrecorded() {
        let server = HttpServer::new(config()).unwrap();
        let response = router(&server)
            .oneshot(Request::builder().uri("/projects/2").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let instr = server.instrumentation();
        assert_eq!(instr.global().snapshot().total_count, 0);
        assert!(instr.recent().is_empty());
        assert_eq!(instr.connections().current("/projects/{id}"), 0);
        assert_eq!(instr.connections().max("/projects/{id}"), 1);
    }
}
