//! Transient submission types shared by the validation pipeline.

use std::fmt;

use bytes::Bytes;
use serde::Serialize;
use utoipa::ToSchema;

use super::game::{Dimensions, GameFormat, Genre, Tier};

/// Ordered pipeline stages. A submission failing several checks reports the
/// earliest stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fields,
    RateLimit,
    Classify,
    Structure,
    Source,
    Thumbnail,
    Libraries,
    Publish,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fields => "fields",
            Stage::RateLimit => "rate_limit",
            Stage::Classify => "classify",
            Stage::Structure => "structure",
            Stage::Source => "source",
            Stage::Thumbnail => "thumbnail",
            Stage::Libraries => "libraries",
            Stage::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file part read from the request with a byte cap.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub bytes: Bytes,
    /// Set when the reader stopped at its cap: the upload is larger than `bytes`.
    pub truncated: bool,
}

impl UploadedFile {
    pub fn new(file_name: Option<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name,
            bytes: bytes.into(),
            truncated: false,
        }
    }

    /// Lowercased extension of the client-supplied file name.
    pub fn extension(&self) -> Option<String> {
        self.file_name.as_deref().and_then(file_extension)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Lowercased extension of a file name, if it has one.
pub fn file_extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

/// Raw multipart request. Owned by the request for its whole lifetime.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub title: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub tags: Option<String>,
    pub format: Option<String>,
    pub dimensions: Option<String>,
    pub libs: Option<String>,
    pub tier: Option<String>,
    pub game_file: Option<UploadedFile>,
    pub thumbnail: Option<UploadedFile>,
    /// Client-supplied `Idempotency-Key` header.
    pub idempotency_key: Option<String>,
}

/// Field set after the field validator has normalised it.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFields {
    pub title: String,
    pub description: String,
    pub genre: Genre,
    pub tags: Vec<String>,
    pub format: GameFormat,
    pub dimensions: Dimensions,
    pub libs: Vec<String>,
    pub tier: Option<Tier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    DebugOutput,
    BlockingDialog,
    MissingViewport,
    FormatMismatch,
}

/// Non-blocking finding attached to a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Warning {
    pub code: WarningCode,
    pub message: String,
}

impl Warning {
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
