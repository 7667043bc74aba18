//! Request tracing middleware with correlation ID and W3C Trace Context support.
//!
//! Each request runs inside an `http_request` span so pipeline logs and SQLx
//! queries nest under it when OpenTelemetry is enabled.

use axum::{
    extract::Request,
    http::{header::HeaderValue, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

/// The header name for correlation IDs.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

const TRACEPARENT_HEADER: &str = "traceparent";
const MAX_CORRELATION_ID_LEN: usize = 128;

/// Correlation ID for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn acceptable(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_CORRELATION_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// Trace id from a `traceparent` value (`version-traceid-parentid-flags`).
fn trace_id(traceparent: &str) -> Option<&str> {
    let mut parts = traceparent.split('-');
    let _version = parts.next()?;
    let id = parts.next()?;
    (id.len() == 32 && id.bytes().all(|b| b.is_ascii_hexdigit())).then_some(id)
}

/// Explicit header first, then the W3C trace id, else a fresh UUID.
/// Client values that are oversized or carry odd characters are replaced.
pub fn correlation_id_from_headers(headers: &HeaderMap) -> CorrelationId {
    let header = |name: &str| headers.get(name).and_then(|h| h.to_str().ok());

    header(CORRELATION_ID_HEADER)
        .filter(|id| acceptable(id))
        .or_else(|| header(TRACEPARENT_HEADER).and_then(trace_id))
        .map(|id| CorrelationId(id.to_string()))
        .unwrap_or_else(|| CorrelationId(Uuid::new_v4().to_string()))
}

pub async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = correlation_id_from_headers(request.headers());
    request.extensions_mut().insert(correlation_id.clone());

    let span = tracing::info_span!(
        "http_request",
        correlation_id = %correlation_id,
        method = %request.method(),
        uri = %request.uri().path(),
    );

    async move {
        let mut response = next.run(request).await;
        if let Ok(value) = HeaderValue::from_str(&correlation_id.0) {
            response.headers_mut().insert(CORRELATION_ID_HEADER, value);
        }
        tracing::info!(status = response.status().as_u16(), "Request completed");
        response
    }
    .instrument(span)
    .await
}
