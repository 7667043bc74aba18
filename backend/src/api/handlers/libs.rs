//! Shared library catalogue.

use axum::{extract::State, Json};
use utoipa::OpenApi;

use crate::api::dto::{ApiResponse, LibsResponse};
use crate::api::SharedState;

#[utoipa::path(
    get,
    path = "/api/libs",
    tag = "libs",
    responses(
        (status = 200, description = "Library keys accepted in the `libs` field", body = LibsResponse)
    )
)]
pub async fn list_libs(State(state): State<SharedState>) -> Json<ApiResponse<LibsResponse>> {
    Json(ApiResponse::ok(LibsResponse {
        libs: state.libraries.list_keys(),
    }))
}

#[derive(OpenApi)]
#[openapi(paths(list_libs), components(schemas(LibsResponse)))]
pub struct LibsApiDoc;
