//! Zip asset bundle validation.
//!
//! Entries are decompressed one at a time through a bounded reader. Sizes come
//! from the bytes actually produced, never from the central directory, and the
//! running total is checked before each read so a zip bomb cannot inflate past
//! the tier ceiling.

use std::collections::HashSet;
use std::io::{Cursor, Read};

use serde::Serialize;
use zip::ZipArchive;

use super::{KB, MB, SCRIPT_MAX_BYTES};
use crate::error::{Rejection, SubReason};

/// Name of the entry point every bundle must carry at its root.
pub const GAME_JS: &str = "game.js";

/// Upper bound on entries, to keep directory walks cheap.
pub const MAX_ENTRIES: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Image,
    Audio,
    Model,
    Font,
    Json,
    Script,
}

impl AssetCategory {
    /// Category of an allow-listed extension. Formats that can carry script,
    /// such as `svg` or `html`, are not listed.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let category = match ext {
            "png" | "jpg" | "jpeg" | "gif" | "webp" => AssetCategory::Image,
            "mp3" | "ogg" | "wav" | "m4a" => AssetCategory::Audio,
            "glb" | "gltf" | "obj" | "bin" => AssetCategory::Model,
            "ttf" | "otf" | "woff" | "woff2" => AssetCategory::Font,
            "json" => AssetCategory::Json,
            _ => return None,
        };
        Some(category)
    }

    pub fn max_bytes(&self) -> u64 {
        match self {
            AssetCategory::Image => 5 * MB,
            AssetCategory::Audio => 10 * MB,
            AssetCategory::Model => 20 * MB,
            AssetCategory::Font => 2 * MB,
            AssetCategory::Json => MB,
            AssetCategory::Script => SCRIPT_MAX_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZipEntry {
    pub path: String,
    pub extension: String,
    pub category: AssetCategory,
    pub size_bytes: u64,
}

/// Listing of a bundle that passed every layout check.
#[derive(Debug, Clone)]
pub struct BundleReport {
    pub entries: Vec<ZipEntry>,
    pub game_js: String,
    pub total_bytes: u64,
}

fn invalid_zip(message: impl Into<String>) -> Rejection {
    Rejection::asset_bundle(SubReason::InvalidZip, message)
}

/// Normalise an entry name, rejecting anything that could escape the bundle.
fn safe_entry_path(raw: &str) -> Option<String> {
    if raw.is_empty()
        || raw.starts_with('/')
        || raw.contains('\\')
        || raw.contains('\0')
        || raw.contains(':')
    {
        return None;
    }
    if raw.split('/').any(|part| part == "..") {
        return None;
    }
    Some(raw.trim_start_matches("./").to_string())
}

fn extension_of(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Validate the layout of a zip bundle against a tier ceiling.
pub fn validate_bundle(bytes: &[u8], tier_ceiling: u64) -> Result<BundleReport, Rejection> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| invalid_zip(format!("Game file is not a readable zip archive: {}", e)))?;

    if archive.len() > MAX_ENTRIES {
        return Err(invalid_zip(format!(
            "Bundle has {} entries, the maximum is {}",
            archive.len(),
            MAX_ENTRIES
        ))
        .with_detail("max_entries", MAX_ENTRIES));
    }

    let mut entries = Vec::new();
    let mut seen = HashSet::new();
    let mut total: u64 = 0;
    let mut game_js: Option<Vec<u8>> = None;

    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| invalid_zip(format!("Corrupt zip entry #{}: {}", index, e)))?;
        if entry.is_dir() {
            continue;
        }

        let raw_name = entry.name().to_string();
        let path = match (entry.enclosed_name(), safe_entry_path(&raw_name)) {
            (Some(_), Some(path)) => path,
            _ => {
                return Err(Rejection::asset_bundle(
                    SubReason::InvalidPath,
                    format!("Bundle entry '{}' has an unsafe path", raw_name),
                )
                .with_detail("path", raw_name))
            }
        };
        if !seen.insert(path.clone()) {
            return Err(invalid_zip(format!("Duplicate bundle entry '{}'", path))
                .with_detail("path", path));
        }

        let extension = extension_of(&path);
        let category = if path == GAME_JS {
            AssetCategory::Script
        } else {
            match AssetCategory::from_extension(&extension) {
                Some(category) => category,
                None => {
                    return Err(Rejection::asset_bundle(
                        SubReason::InvalidFileType,
                        format!("File type of '{}' is not allowed in bundles", path),
                    )
                    .with_detail("path", path)
                    .with_detail("extension", extension))
                }
            }
        };

        let limit = category.max_bytes();
        let budget = tier_ceiling.saturating_sub(total);
        let cap = limit.min(budget);

        let mut buf = Vec::new();
        entry
            .take(cap + 1)
            .read_to_end(&mut buf)
            .map_err(|e| invalid_zip(format!("Failed to decompress '{}': {}", path, e)))?;
        let read = buf.len() as u64;

        if read > limit {
            let (reason, message) = if category == AssetCategory::Script {
                (
                    SubReason::GameJsTooLarge,
                    format!("{} exceeds the {} byte limit", GAME_JS, limit),
                )
            } else {
                (
                    SubReason::AssetTooLarge,
                    format!("'{}' exceeds the {} byte limit for {:?} assets", path, limit, category),
                )
            };
            return Err(Rejection::asset_bundle(reason, message)
                .with_detail("path", path)
                .with_detail("max_bytes", limit)
                .with_detail("min_actual_bytes", read));
        }
        if read > budget {
            return Err(Rejection::asset_bundle(
                SubReason::BundleTooLarge,
                format!(
                    "Uncompressed bundle exceeds the {} byte tier limit",
                    tier_ceiling
                ),
            )
            .with_detail("max_bytes", tier_ceiling)
            .with_detail("min_actual_bytes", total + read));
        }
        total += read;

        if category == AssetCategory::Script {
            game_js = Some(buf);
        }
        entries.push(ZipEntry {
            path,
            extension,
            category,
            size_bytes: read,
        });
    }

    let game_js = game_js.ok_or_else(|| {
        Rejection::asset_bundle(
            SubReason::MissingGameJs,
            format!("Bundle must contain {} at the archive root", GAME_JS),
        )
    })?;
    let game_js = String::from_utf8(game_js).map_err(|_| {
        Rejection::asset_bundle(
            SubReason::InvalidEncoding,
            format!("{} must be UTF-8 text", GAME_JS),
        )
    })?;

    Ok(BundleReport {
        entries,
        game_js,
        total_bytes: total,
    })
}
