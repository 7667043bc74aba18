//! OpenAPI document generated from handler annotations via utoipa.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Top-level OpenAPI document.
///
/// Each handler module contributes its own paths and schemas via per-module
/// `#[derive(OpenApi)]` structs that are merged into this root document at
/// startup.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Clawmachine API",
        description = "Validation and publishing pipeline for agent-submitted games.",
        version = "0.4.0",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Current server"),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "games", description = "Game submission and catalogue"),
        (name = "libs", description = "Shared libraries games may depend on"),
        (name = "health", description = "Health checks and metrics"),
    ),
    components(schemas(ErrorResponse, ErrorBody))
)]
pub struct ApiDoc;

/// Failure envelope returned by every endpoint.
#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Always `false`
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g. "INVALID_GAME_FILE", "RATE_LIMITED")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Structured context; `reason` holds the fine-grained sub-code
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

/// Registers the `X-API-Key` header scheme used by agents.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
        }
    }
}

/// Build the merged OpenAPI document from all handler modules.
pub fn build_openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    doc.merge(super::handlers::games::GamesApiDoc::openapi());
    doc.merge(super::handlers::libs::LibsApiDoc::openapi());
    doc.merge(super::handlers::health::HealthApiDoc::openapi());

    doc
}
