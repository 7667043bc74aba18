//! Application error types and result alias.

use std::fmt;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::models::quota::QuotaStatus;
use crate::models::submission::Stage;

/// Application result type alias
pub type Result<T> = std::result::Result<T, AppError>;

/// Top-level error code returned in `error.code` of every failure envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    InvalidGameFile,
    InvalidThumbnail,
    InvalidLibrary,
    InvalidAssetBundle,
    RateLimited,
    Unauthorized,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::InvalidGameFile => "INVALID_GAME_FILE",
            ErrorCode::InvalidThumbnail => "INVALID_THUMBNAIL",
            ErrorCode::InvalidLibrary => "INVALID_LIBRARY",
            ErrorCode::InvalidAssetBundle => "INVALID_ASSET_BUNDLE",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained sub-code carried in `error.details.reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubReason {
    MissingField,
    InvalidField,
    FileTooLarge,
    InvalidEncoding,
    MissingHtmlStructure,
    MissingCanvas,
    InvalidExternalScript,
    InvalidZip,
    MissingGameJs,
    GameJsTooLarge,
    AssetTooLarge,
    InvalidFileType,
    BundleTooLarge,
    InvalidPath,
    MissingGameObject,
    MissingMethod,
    ForbiddenApi,
    WrongFormat,
    WrongDimensions,
    UnknownLibrary,
}

impl SubReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubReason::MissingField => "MISSING_FIELD",
            SubReason::InvalidField => "INVALID_FIELD",
            SubReason::FileTooLarge => "FILE_TOO_LARGE",
            SubReason::InvalidEncoding => "INVALID_ENCODING",
            SubReason::MissingHtmlStructure => "MISSING_HTML_STRUCTURE",
            SubReason::MissingCanvas => "MISSING_CANVAS",
            SubReason::InvalidExternalScript => "INVALID_EXTERNAL_SCRIPT",
            SubReason::InvalidZip => "INVALID_ZIP",
            SubReason::MissingGameJs => "MISSING_GAME_JS",
            SubReason::GameJsTooLarge => "GAME_JS_TOO_LARGE",
            SubReason::AssetTooLarge => "ASSET_TOO_LARGE",
            SubReason::InvalidFileType => "INVALID_FILE_TYPE",
            SubReason::BundleTooLarge => "BUNDLE_TOO_LARGE",
            SubReason::InvalidPath => "INVALID_PATH",
            SubReason::MissingGameObject => "MISSING_GAME_OBJECT",
            SubReason::MissingMethod => "MISSING_METHOD",
            SubReason::ForbiddenApi => "FORBIDDEN_API",
            SubReason::WrongFormat => "WRONG_FORMAT",
            SubReason::WrongDimensions => "WRONG_DIMENSIONS",
            SubReason::UnknownLibrary => "UNKNOWN_LIBRARY",
        }
    }
}

impl fmt::Display for SubReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client-correctable validation failure.
///
/// Produced by the pipeline stages and returned to the submitter verbatim.
/// The stage is stamped by the pipeline when the rejection leaves a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub stage: Option<Stage>,
    pub code: ErrorCode,
    pub reason: Option<SubReason>,
    pub message: String,
    pub details: Map<String, Value>,
}

impl Rejection {
    pub fn new(code: ErrorCode, reason: SubReason, message: impl Into<String>) -> Self {
        Self {
            stage: None,
            code,
            reason: Some(reason),
            message: message.into(),
            details: Map::new(),
        }
    }

    pub fn request(reason: SubReason, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, reason, message)
    }

    pub fn game_file(reason: SubReason, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidGameFile, reason, message)
    }

    pub fn asset_bundle(reason: SubReason, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAssetBundle, reason, message)
    }

    pub fn thumbnail(reason: SubReason, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidThumbnail, reason, message)
    }

    /// Attach an extra detail field. Values that fail to serialize are dropped.
    pub fn with_detail(mut self, key: &str, value: impl Serialize) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.details.insert(key.to_string(), value);
        }
        self
    }

    /// Stamp the stage that produced this rejection.
    pub fn at(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Details object as sent to the client, with `reason` first-class.
    pub fn details_json(&self) -> Value {
        let mut details = Map::new();
        if let Some(reason) = self.reason {
            details.insert("reason".to_string(), json!(reason));
        }
        for (k, v) in &self.details {
            details.insert(k.clone(), v.clone());
        }
        Value::Object(details)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            Some(reason) => write!(f, "{} ({}): {}", self.code, reason, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Address parse error
    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or unknown API key
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Not found error
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Submission rejected by a validation stage
    #[error("Submission rejected: {0}")]
    Rejected(Rejection),

    /// Daily submission quota exhausted
    #[error("Daily submission limit reached ({}/{})", .0.used, .0.limit)]
    RateLimited(QuotaStatus),

    /// Pipeline exceeded its wall-clock budget
    #[error("Submission timed out after {0:?}")]
    Timeout(Duration),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(format!("migration failed: {}", e))
    }
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        AppError::Rejected(rejection)
    }
}

impl AppError {
    /// Public error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Rejected(r) => r.code,
            AppError::RateLimited(_) => ErrorCode::RateLimited,
            AppError::Unauthorized(_) => ErrorCode::Unauthorized,
            AppError::NotFound(_) => ErrorCode::NotFound,
            _ => ErrorCode::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Rejected(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The rejection, if this error came from a validation stage.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            AppError::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (message, details) = match &self {
            AppError::Rejected(r) => (r.message.clone(), Some(r.details_json())),
            AppError::RateLimited(quota) => (
                self.to_string(),
                Some(json!({
                    "limit": quota.limit,
                    "used": quota.used,
                    "resets_at": quota.resets_at,
                })),
            ),
            AppError::Unauthorized(msg) | AppError::NotFound(msg) => (msg.clone(), None),
            AppError::Timeout(_) => (
                "Submission could not be processed in time, retry later".to_string(),
                None,
            ),
            _ => ("Internal server error, retry later".to_string(), None),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, code = %code, "Request error");
        } else {
            tracing::debug!(error = %self, code = %code, "Request rejected");
        }

        let mut error = json!({
            "code": code,
            "message": message,
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "success": false, "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_codes_serialize_screaming_snake() {
        assert_eq!(json!(ErrorCode::InvalidAssetBundle), json!("INVALID_ASSET_BUNDLE"));
        assert_eq!(json!(SubReason::GameJsTooLarge), json!("GAME_JS_TOO_LARGE"));
        assert_eq!(SubReason::ForbiddenApi.as_str(), "FORBIDDEN_API");
    }

    #[test]
    fn test_rejection_details_include_reason() {
        let r = Rejection::game_file(SubReason::MissingMethod, "missing")
            .with_detail("missing_methods", vec!["reset", "getMeta"]);
        let details = r.details_json();
        assert_eq!(details["reason"], "MISSING_METHOD");
        assert_eq!(details["missing_methods"], json!(["reset", "getMeta"]));
    }

    #[test]
    fn test_rejection_at_stamps_stage() {
        let r = Rejection::thumbnail(SubReason::WrongFormat, "gif").at(Stage::Thumbnail);
        assert_eq!(r.stage, Some(Stage::Thumbnail));
    }

    #[tokio::test]
    async fn test_rejected_renders_400_envelope() {
        let err: AppError = Rejection::asset_bundle(SubReason::InvalidZip, "not a zip").into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "INVALID_ASSET_BUNDLE");
        assert_eq!(body["error"]["details"]["reason"], "INVALID_ZIP");
    }

    #[tokio::test]
    async fn test_rate_limited_renders_429_with_quota() {
        let quota = QuotaStatus {
            limit: 10,
            used: 10,
            resets_at: Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap(),
        };
        let response = AppError::RateLimited(quota).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
        assert_eq!(body["error"]["details"]["limit"], 10);
        assert_eq!(body["error"]["details"]["used"], 10);
    }

    #[tokio::test]
    async fn test_internal_errors_hide_details() {
        let response = AppError::Database("disk I/O error at page 7".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert!(!body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("disk I/O"));
    }

    #[test]
    fn test_unauthorized_status() {
        let err = AppError::Unauthorized("Invalid API key".into());
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }
}
