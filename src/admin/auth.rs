use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;

/// Basic-auth credentials guarding the diagnostic API.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    expected: Arc<str>,
}

impl AdminCredentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            expected: Arc::from(STANDARD.encode(format!("{username}:{password}"))),
        }
    }

    /// Checks an `Authorization` header value.
    pub fn verify(&self, header_value: &str) -> bool {
        match header_value.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("basic") => {
                token.trim() == &*self.expected
            }
            _ => false,
        }
    }
}

pub async fn admin_auth_middleware(
    State(credentials): State<AdminCredentials>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|value| credentials.verify(value));

    if authorized {
        return next.run(request).await;
    }

    tracing::debug!(uri = %request.uri(), "Rejected unauthenticated admin request");
    (
        StatusCode::UNAUTHORIZED,
        [(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"banme\""),
        )],
        "Unauthorized",
    )
        .into_response()
}
