//! Diagnostic API.
//!
//! # Responsibilities
//! - `GET {prefix}/api/info`: full statistics report as JSON
//! - `GET|POST {prefix}/api/unban`: clear every ban
//! - Anything else under `{prefix}/api/` is a 404, never proxied
//!
//! All routes sit behind HTTP Basic auth.

pub mod auth;
pub mod handlers;
pub mod report;
pub mod system;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use self::auth::{admin_auth_middleware, AdminCredentials};
use self::handlers::{get_info, not_found, unban};
use crate::config::AdminConfig;
use crate::http::instrument::Instrumentation;

pub use report::DiagnosticReport;

pub fn setup_admin_router(config: &AdminConfig, instrumentation: Arc<Instrumentation>) -> Router {
    let prefix = config.path_prefix.trim_end_matches('/');
    let credentials = AdminCredentials::new(&config.username, &config.password);

    Router::new()
        .route(&format!("{prefix}/api/info"), get(get_info))
        .route(&format!("{prefix}/api/unban"), get(unban).post(unban))
        .route(&format!("{prefix}/api"), get(not_found).post(not_found))
        .route(&format!("{prefix}/api/{{*rest}}"), get(not_found).post(not_found))
        .layer(middleware::from_fn_with_state(credentials, admin_auth_middleware))
        .with_state(instrumentation)
}
