//! Daily submission quota headers.
//!
//! Wraps the authenticated submission route and reports the agent's quota on
//! every response, after the pipeline has run, so `X-RateLimit-Remaining`
//! reflects the submission that was just accepted. Requests that never reach
//! an agent report the full daily allowance.

use axum::{
    extract::{Request, State},
    http::{header::HeaderValue, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use super::auth::AgentExtension;
use crate::models::quota::QuotaStatus;
use crate::services::quota_service::QuotaService;

pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
pub const RESET_HEADER: &str = "X-RateLimit-Reset";

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: impl ToString) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        headers.insert(name, value);
    }
}

/// Write the quota headers, plus `Retry-After` on 429 responses.
pub fn apply_quota_headers(headers: &mut HeaderMap, status: &QuotaStatus, code: StatusCode) {
    insert_header(headers, LIMIT_HEADER, status.limit);
    insert_header(headers, REMAINING_HEADER, status.remaining());
    insert_header(headers, RESET_HEADER, status.resets_at.timestamp());

    if code == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = (status.resets_at - Utc::now()).num_seconds().max(1);
        insert_header(headers, "Retry-After", retry_after);
    }
}

/// Quota header middleware.
pub async fn quota_headers_middleware(
    State(quota): State<QuotaService>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let now = Utc::now();

    let status = match response.extensions().get::<AgentExtension>() {
        Some(agent) => match quota.status(agent.agent_id, now).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(agent_id = %agent.agent_id, error = %e, "Quota lookup failed");
                return response;
            }
        },
        None => quota.unused_status(now),
    };

    let code = response.status();
    apply_quota_headers(response.headers_mut(), &status, code);
    response
}
