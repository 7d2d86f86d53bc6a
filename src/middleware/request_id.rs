//! Request ID middleware for tracing.

use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct RequestId(pub Arc<str>);

impl RequestId {
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Accepts a well-formed inbound `x-request-id`, otherwise mints one, and
/// wraps the request in a span carrying it. The id is echoed back on the
/// response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = incoming_request_id(&request).unwrap_or_else(RequestId::generate);

    request.extensions_mut().insert(request_id.clone());

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
    );

    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }

    response
}

fn incoming_request_id(request: &Request) -> Option<RequestId> {
    let id = request
        .headers()
        .get(&REQUEST_ID_HEADER)?
        .to_str()
        .ok()?;

    if is_well_formed(id) {
        Some(RequestId(Arc::from(id)))
    } else {
        None
    }
}

fn is_well_formed(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(RequestId::generate().as_str(), RequestId::generate().as_str());
    }

    #[test]
    fn test_well_formed_ids() {
        assert!(is_well_formed("abc123"));
        assert!(is_well_formed("abc-123_XYZ"));
        assert!(is_well_formed(&"a".repeat(MAX_REQUEST_ID_LEN)));
    }

    #[test]
    fn test_malformed_ids_rejected() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("abc 123"));
        assert!(!is_well_formed("abc/123"));
        assert!(!is_well_formed(&"a".repeat(MAX_REQUEST_ID_LEN + 1)));
    }
}
