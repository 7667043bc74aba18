//! Game submission and catalogue handlers.

use axum::{
    extract::{multipart::Field, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Extension, Json, Router,
};
use bytes::{Bytes, BytesMut};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::dto::{
    ApiResponse, GameListResponse, GameResponse, Pagination, PaginationQuery, SubmitGameResponse,
};
use crate::api::middleware::auth::AgentExtension;
use crate::api::SharedState;
use crate::error::{AppError, Rejection, Result, SubReason};
use crate::formats::thumbnail::THUMBNAIL_MAX_BYTES;
use crate::formats::{read_cap, MAX_GAME_FILE_BYTES};
use crate::models::game::{Dimensions, GameFormat, GameRecord, Genre, Tier};
use crate::models::submission::{
    file_extension, Stage, Submission, UploadedFile, Warning, WarningCode,
};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Longest accepted text field. Anything longer is cut and fails validation.
const TEXT_FIELD_MAX_BYTES: usize = 16 * 1024;

/// Public read routes. The submission route is mounted separately behind auth.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/games", get(list_games))
        .route("/api/games/{id}", get(get_game))
}

/// Multipart form accepted by `POST /api/games`.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct SubmitGameForm {
    /// 3 to 100 characters
    title: String,
    description: Option<String>,
    genre: Genre,
    /// JSON array or comma-separated list, at most 5 entries
    tags: Option<String>,
    format: Option<GameFormat>,
    dimensions: Option<Dimensions>,
    /// JSON array or comma-separated list of library keys
    libs: Option<String>,
    /// Required for zip bundles
    tier: Option<Tier>,
    #[schema(value_type = String, format = Binary)]
    game_file: Vec<u8>,
    #[schema(value_type = String, format = Binary)]
    thumbnail: Vec<u8>,
}

fn malformed(e: axum::extract::multipart::MultipartError) -> AppError {
    let reason = if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        SubReason::FileTooLarge
    } else {
        SubReason::InvalidField
    };
    Rejection::request(reason, format!("Malformed multipart body: {}", e.body_text()))
        .at(Stage::Fields)
        .into()
}

/// Read a part, keeping at most `cap` bytes. `truncated` records that more followed.
async fn read_capped(field: &mut Field<'_>, cap: usize) -> Result<(Bytes, bool)> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(malformed)? {
        let room = cap - buf.len();
        if chunk.len() > room {
            buf.extend_from_slice(&chunk[..room]);
            return Ok((buf.freeze(), true));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok((buf.freeze(), false))
}

async fn read_file(field: &mut Field<'_>, cap: u64) -> Result<UploadedFile> {
    let file_name = field.file_name().map(str::to_string);
    let (bytes, truncated) = read_capped(field, cap as usize).await?;
    Ok(UploadedFile {
        file_name,
        bytes,
        truncated,
    })
}

/// Read the game file part, narrowing the cap once its kind is evident so an
/// oversized upload stops at its ceiling plus one byte.
async fn read_game_file(field: &mut Field<'_>, submission: &Submission) -> Result<UploadedFile> {
    let file_name = field.file_name().map(str::to_string);
    let extension = file_name.as_deref().and_then(file_extension);
    let dimensions = submission
        .dimensions
        .as_deref()
        .and_then(|d| Dimensions::parse(&d.trim().to_ascii_lowercase()));
    let tier = submission
        .tier
        .as_deref()
        .and_then(|t| Tier::parse(&t.trim().to_ascii_lowercase()));

    let mut buf = BytesMut::new();
    let mut cap: Option<usize> = None;
    while let Some(chunk) = field.chunk().await.map_err(malformed)? {
        let limit = cap.unwrap_or(MAX_GAME_FILE_BYTES as usize);
        let room = limit - buf.len();
        if chunk.len() > room {
            buf.extend_from_slice(&chunk[..room]);
            return Ok(UploadedFile {
                file_name,
                bytes: buf.freeze(),
                truncated: true,
            });
        }
        buf.extend_from_slice(&chunk);

        if cap.is_none() {
            cap = read_cap(extension.as_deref(), &buf, dimensions, tier).map(|c| c as usize);
            if let Some(c) = cap.filter(|c| buf.len() > *c) {
                buf.truncate(c);
                return Ok(UploadedFile {
                    file_name,
                    bytes: buf.freeze(),
                    truncated: true,
                });
            }
        }
    }
    Ok(UploadedFile {
        file_name,
        bytes: buf.freeze(),
        truncated: false,
    })
}

async fn read_text(field: &mut Field<'_>) -> Result<String> {
    let (bytes, _) = read_capped(field, TEXT_FIELD_MAX_BYTES).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Collect the multipart form into a [`Submission`]. Unknown parts are skipped.
pub async fn read_submission(mut multipart: Multipart, headers: &HeaderMap) -> Result<Submission> {
    let mut submission = Submission {
        idempotency_key: headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
        ..Submission::default()
    };

    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "game_file" => {
                let game_file = read_game_file(&mut field, &submission).await?;
                submission.game_file = Some(game_file);
            }
            "thumbnail" => {
                submission.thumbnail = Some(read_file(&mut field, THUMBNAIL_MAX_BYTES).await?)
            }
            "title" => submission.title = Some(read_text(&mut field).await?),
            "description" => submission.description = Some(read_text(&mut field).await?),
            "genre" => submission.genre = Some(read_text(&mut field).await?),
            "tags" => submission.tags = Some(read_text(&mut field).await?),
            "format" => submission.format = Some(read_text(&mut field).await?),
            "dimensions" => submission.dimensions = Some(read_text(&mut field).await?),
            "libs" => submission.libs = Some(read_text(&mut field).await?),
            "tier" => submission.tier = Some(read_text(&mut field).await?),
            other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    Ok(submission)
}

#[utoipa::path(
    post,
    path = "",
    context_path = "/api/games",
    tag = "games",
    request_body(content = SubmitGameForm, content_type = "multipart/form-data"),
    params(
        ("Idempotency-Key" = Option<String>, Header, description = "Replays the original publish when repeated")
    ),
    responses(
        (status = 201, description = "Game published, or the original publish replayed", body = SubmitGameResponse),
        (status = 400, description = "Validation failed", body = crate::api::openapi::ErrorResponse),
        (status = 401, description = "Missing or unknown API key", body = crate::api::openapi::ErrorResponse),
        (status = 429, description = "Daily submission limit reached", body = crate::api::openapi::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::api::openapi::ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn submit_game(
    State(state): State<SharedState>,
    Extension(agent): Extension<AgentExtension>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<SubmitGameResponse>>)> {
    let submission = read_submission(multipart, &headers).await?;
    let outcome = state.submissions.submit(agent.agent_id, submission).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(SubmitGameResponse {
            game: outcome.game,
            warnings: outcome.warnings,
        })),
    ))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListGamesQuery {
    /// Page number (default: 1)
    pub page: Option<u32>,
    /// Items per page (default: 20, max: 100)
    pub per_page: Option<u32>,
    /// Only games of this genre
    pub genre: Option<String>,
}

#[utoipa::path(
    get,
    path = "",
    context_path = "/api/games",
    tag = "games",
    params(ListGamesQuery),
    responses(
        (status = 200, description = "Newest games first", body = GameListResponse),
        (status = 400, description = "Unknown genre", body = crate::api::openapi::ErrorResponse)
    )
)]
pub async fn list_games(
    State(state): State<SharedState>,
    Query(query): Query<ListGamesQuery>,
) -> Result<Json<ApiResponse<GameListResponse>>> {
    let genre = match query.genre.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
        None => None,
        Some(raw) => Some(Genre::parse(&raw.to_ascii_lowercase()).ok_or_else(|| {
            Rejection::request(SubReason::InvalidField, format!("Unknown genre '{}'", raw))
                .with_detail("field", "genre")
                .with_detail("allowed", Genre::ALL.map(|g| g.as_str()))
        })?),
    };

    let page = PaginationQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let (games, total) = state
        .games
        .list(genre, page.offset(), i64::from(page.per_page()))
        .await?;

    Ok(Json(ApiResponse::ok(GameListResponse {
        games,
        pagination: Pagination::from_query_and_total(&page, total),
    })))
}

#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/games",
    tag = "games",
    params(
        ("id" = Uuid, Path, description = "Game ID")
    ),
    responses(
        (status = 200, description = "Published game", body = GameResponse),
        (status = 404, description = "Game not found", body = crate::api::openapi::ErrorResponse)
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<GameResponse>>> {
    let game = state.games.get(id).await?;
    Ok(Json(ApiResponse::ok(GameResponse { game })))
}

#[derive(OpenApi)]
#[openapi(
    paths(submit_game, list_games, get_game),
    components(schemas(
        SubmitGameForm,
        SubmitGameResponse,
        GameResponse,
        GameListResponse,
        Pagination,
        GameRecord,
        Genre,
        GameFormat,
        Dimensions,
        Tier,
        Warning,
        WarningCode,
    ))
)]
pub struct GamesApiDoc;
