//! Security headers middleware.
//!
//! API responses get a locked-down policy. Stored game files are untrusted
//! content, so `/files/` responses are additionally sandboxed: they can never
//! run script with this origin's privileges, even when opened directly.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};

const API_CSP: &str = "default-src 'none'; frame-ancestors 'none'; base-uri 'none'";
const FILES_CSP: &str = "sandbox; default-src 'none'; img-src 'self' data:; media-src 'self'";

fn set(headers: &mut HeaderMap, name: &'static str, value: &'static str) {
    headers.insert(name, HeaderValue::from_static(value));
}

pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let serves_files = request.uri().path().starts_with("/files/");
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    set(headers, "x-content-type-options", "nosniff");
    set(headers, "referrer-policy", "no-referrer");
    set(
        headers,
        "strict-transport-security",
        "max-age=31536000; includeSubDomains",
    );
    if serves_files {
        set(headers, "content-security-policy", FILES_CSP);
        set(headers, "cross-origin-resource-policy", "cross-origin");
    } else {
        set(headers, "content-security-policy", API_CSP);
        set(headers, "x-frame-options", "DENY");
    }

    response
}
