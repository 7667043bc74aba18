//! Agent authentication middleware.
//!
//! Supported authentication methods:
//! - `X-API-Key: <api_key>`
//! - `Authorization: Bearer <api_key>`

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderName},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::auth_service::AuthService;

/// Custom header name for API key
static X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

/// Authenticated agent, inserted into request and response extensions.
#[derive(Debug, Clone)]
pub struct AgentExtension {
    pub agent_id: Uuid,
    pub name: String,
}

/// API key from `X-API-Key`, falling back to a Bearer token.
fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get(&X_API_KEY).and_then(|h| h.to_str().ok()) {
        return Some(key.trim());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Require a valid agent API key.
pub async fn auth_middleware(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(key) = extract_api_key(request.headers()).map(str::to_string) else {
        return AppError::Unauthorized("Missing API key".to_string()).into_response();
    };

    let agent = match auth_service.resolve_api_key(&key).await {
        Ok(agent) => agent,
        Err(e) => return e.into_response(),
    };

    let extension = AgentExtension {
        agent_id: agent.id,
        name: agent.name,
    };
    request.extensions_mut().insert(extension.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(extension);
    response
}
