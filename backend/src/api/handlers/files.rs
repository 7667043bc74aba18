//! Serves stored game files and thumbnails under their public URLs.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::storage::validate_key;

fn content_type_for(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" => "text/html; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "zip" => "application/zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// GET /files/{*key}
pub async fn serve_file(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Response> {
    validate_key(&key).map_err(|_| AppError::NotFound(format!("File {} not found", key)))?;
    let content = state.storage.get(&key).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type_for(&key)),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        Body::from(content),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type_for("games/a/game.html"), "text/html; charset=utf-8");
        assert_eq!(content_type_for("games/a/game.js"), "text/javascript; charset=utf-8");
        assert_eq!(content_type_for("games/a/game.zip"), "application/zip");
        assert_eq!(content_type_for("games/a/thumbnail.JPG"), "image/jpeg");
        assert_eq!(content_type_for("games/a/blob"), "application/octet-stream");
    }
}
