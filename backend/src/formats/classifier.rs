//! Artifact classifier.
//!
//! Determines the real kind of an uploaded game file from its extension and
//! magic bytes, then applies the size ceiling for that kind. The declared
//! `format` field never overrides what the bytes say.

use bytes::Bytes;
use serde::Serialize;

use super::{KB, MAX_GAME_FILE_BYTES, MB, SCRIPT_MAX_BYTES};
use crate::error::{Rejection, SubReason};
use crate::models::game::{Dimensions, GameFormat, Tier};
use crate::models::submission::{NormalizedFields, UploadedFile};

const ZIP_LOCAL_HEADER: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_ARCHIVE: &[u8] = b"PK\x05\x06";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Html,
    Script,
    ZipBundle,
}

impl ArtifactKind {
    /// Format recorded on the published game. Bundles are served as HTML.
    pub fn published_format(&self) -> GameFormat {
        match self {
            ArtifactKind::Script => GameFormat::Script,
            ArtifactKind::Html | ArtifactKind::ZipBundle => GameFormat::Html,
        }
    }

    /// Byte ceiling for this kind. Bundles without a tier have no valid ceiling.
    pub fn ceiling_bytes(&self, dimensions: Dimensions, tier: Option<Tier>) -> Option<u64> {
        match (self, dimensions) {
            (ArtifactKind::Html, d) => Some(html_ceiling(Some(d))),
            (ArtifactKind::Script, _) => Some(SCRIPT_MAX_BYTES),
            (ArtifactKind::ZipBundle, _) => tier.map(|t| t.ceiling_bytes()),
        }
    }
}

/// Classified, sized view of the uploaded game file.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub declared_format: GameFormat,
    pub dimensions: Dimensions,
    pub tier: Option<Tier>,
    /// Counted from the bytes actually read.
    pub size_bytes: u64,
    pub ceiling_bytes: u64,
    pub bytes: Bytes,
}

/// Kind evident from magic bytes, then extension, then leading markup.
fn detect(extension: Option<&str>, bytes: &[u8]) -> Option<ArtifactKind> {
    let head = &bytes[..bytes.len().min(4)];
    if head == ZIP_LOCAL_HEADER || head == ZIP_EMPTY_ARCHIVE {
        return Some(ArtifactKind::ZipBundle);
    }

    match extension {
        Some("zip") => return Some(ArtifactKind::ZipBundle),
        Some("js") | Some("mjs") => return Some(ArtifactKind::Script),
        Some("html") | Some("htm") => return Some(ArtifactKind::Html),
        _ => {}
    }

    let starts_with_markup = bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'<');
    starts_with_markup.then_some(ArtifactKind::Html)
}

/// Kind of a game file by magic bytes first, then extension, then content.
pub fn sniff_kind(file: &UploadedFile, declared: GameFormat) -> ArtifactKind {
    detect(file.extension().as_deref(), &file.bytes).unwrap_or(match declared {
        GameFormat::Script => ArtifactKind::Script,
        GameFormat::Html => ArtifactKind::Html,
    })
}

/// How many bytes of a game file to buffer, judged from its extension and
/// leading bytes: the tightest ceiling the file could still fit, plus one.
///
/// `None` until enough bytes have arrived to rule out a zip bundle. Fields
/// that have not arrived yet are assumed to allow the larger ceiling.
pub fn read_cap(
    extension: Option<&str>,
    head: &[u8],
    dimensions: Option<Dimensions>,
    tier: Option<Tier>,
) -> Option<u64> {
    if head.len() < ZIP_LOCAL_HEADER.len() {
        return None;
    }
    let ceiling = match detect(extension, head) {
        Some(ArtifactKind::ZipBundle) => tier.map_or(MAX_GAME_FILE_BYTES, |t| t.ceiling_bytes()),
        Some(ArtifactKind::Script) => SCRIPT_MAX_BYTES,
        Some(ArtifactKind::Html) => html_ceiling(dimensions),
        // script or html depending on the declared format
        None if head.iter().all(u8::is_ascii_whitespace) => return None,
        None => html_ceiling(dimensions),
    };
    Some(ceiling + 1)
}

fn html_ceiling(dimensions: Option<Dimensions>) -> u64 {
    match dimensions {
        Some(Dimensions::TwoD) => 500 * KB,
        _ => 2 * MB,
    }
}

/// Classify the game file and enforce the size ceiling for its kind.
pub fn classify(file: &UploadedFile, fields: &NormalizedFields) -> Result<Artifact, Rejection> {
    let kind = sniff_kind(file, fields.format);

    let ceiling = kind
        .ceiling_bytes(fields.dimensions, fields.tier)
        .ok_or_else(|| {
            Rejection::request(
                SubReason::MissingField,
                "tier is required for zip asset bundles",
            )
            .with_detail("field", "tier")
            .with_detail("allowed", Tier::ALL.map(|t| t.as_str()))
        })?;

    let size = file.len() as u64;
    if file.truncated || size > ceiling {
        let mut rejection = Rejection::game_file(
            SubReason::FileTooLarge,
            format!(
                "Game file exceeds the {} byte limit for this format",
                ceiling
            ),
        )
        .with_detail("max_bytes", ceiling)
        .with_detail("kind", kind);
        rejection = if file.truncated {
            rejection.with_detail("min_actual_bytes", size)
        } else {
            rejection.with_detail("actual_bytes", size)
        };
        return Err(rejection);
    }

    Ok(Artifact {
        kind,
        declared_format: fields.format,
        dimensions: fields.dimensions,
        tier: fields.tier,
        size_bytes: size,
        ceiling_bytes: ceiling,
        bytes: file.bytes.clone(),
    })
}
