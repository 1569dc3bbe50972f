//! HTTP Basic authentication against the pre-shared client password.
//!
//! Only the password is checked; the username is ignored. Requests that fail
//! are answered with 401 before they get anywhere near the bridge.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};

use crate::http::request::request_id;

/// The password every client must present.
#[derive(Clone)]
pub struct ClientPassword(Arc<str>);

impl ClientPassword {
    pub fn new(password: impl Into<Arc<str>>) -> Self {
        Self(password.into())
    }

    fn matches(&self, candidate: &[u8]) -> bool {
        let expected = self.0.as_bytes();
        expected.len() == candidate.len()
            && expected
                .iter()
                .zip(candidate)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

/// Extract the password from a `Basic` Authorization header.
///
/// Returns `None` when the header is absent or malformed.
pub fn basic_auth_password(headers: &HeaderMap) -> Option<Vec<u8>> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64_STANDARD.decode(encoded.trim()).ok()?;
    let colon = decoded.iter().position(|b| *b == b':')?;
    Some(decoded[colon + 1..].to_vec())
}

pub async fn require_basic_auth(
    State(password): State<ClientPassword>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match basic_auth_password(request.headers()) {
        Some(candidate) if password.matches(&candidate) => next.run(request).await,
        candidate => {
            let path = request.uri().path();
            let request_id = request_id(request.headers());
            if candidate.map_or(true, |c| c.is_empty()) {
                tracing::warn!(request_id = %request_id, path = %path, "Missing auth");
            } else {
                tracing::warn!(request_id = %request_id, path = %path, "Incorrect auth");
            }
            (StatusCode::UNAUTHORIZED, "Unauthorized\n").into_response()
        }
    }
}
