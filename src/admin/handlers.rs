use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::admin::report::DiagnosticReport;
use crate::http::instrument::Instrumentation;

pub const UNBAN_MESSAGE: &str = "All IPs have been unbanned.";

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("failed to serialize diagnostic report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Admin request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

pub async fn get_info(
    State(instrumentation): State<Arc<Instrumentation>>,
) -> Result<Response, AdminError> {
    let report = DiagnosticReport::collect(&instrumentation);
    let body = serde_json::to_vec_pretty(&report)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

pub async fn unban(State(instrumentation): State<Arc<Instrumentation>>) -> &'static str {
    instrumentation.bans().unban_all();
    UNBAN_MESSAGE
}

pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
