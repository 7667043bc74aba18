//! Field validator, the first pipeline stage.
//!
//! Every field is checked and all problems are reported together in one
//! `INVALID_REQUEST`, so an agent can fix the whole form in one pass.

use serde::Serialize;

use crate::error::{Rejection, SubReason};
use crate::formats::{sniff_kind, ArtifactKind};
use crate::models::game::{Dimensions, GameFormat, Genre, Tier};
use crate::models::submission::{NormalizedFields, Submission};

pub const TITLE_MIN_CHARS: usize = 3;
pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 2000;
pub const MAX_TAGS: usize = 5;
pub const TAG_MAX_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub reason: SubReason,
    pub message: String,
}

impl FieldError {
    fn missing(field: &'static str) -> Self {
        Self {
            field,
            reason: SubReason::MissingField,
            message: format!("{} is required", field),
        }
    }

    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            reason: SubReason::InvalidField,
            message: message.into(),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parse a list field given either as a JSON array or comma-separated text.
fn parse_list(field: &'static str, raw: Option<&str>) -> Result<Vec<String>, FieldError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let items: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str::<Vec<String>>(raw)
            .map_err(|_| FieldError::invalid(field, format!("{} must be a JSON array of strings", field)))?
    } else {
        raw.split(',').map(str::to_string).collect()
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Validate and normalise the textual fields of a submission.
pub fn validate_fields(submission: &Submission) -> Result<NormalizedFields, Rejection> {
    let mut errors = Vec::new();

    let title = match present(&submission.title) {
        None => {
            errors.push(FieldError::missing("title"));
            String::new()
        }
        Some(title) => {
            let len = title.chars().count();
            if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&len) {
                errors.push(FieldError::invalid(
                    "title",
                    format!(
                        "title must be {}-{} characters, got {}",
                        TITLE_MIN_CHARS, TITLE_MAX_CHARS, len
                    ),
                ));
            }
            title.to_string()
        }
    };

    let description = present(&submission.description).unwrap_or_default().to_string();
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        errors.push(FieldError::invalid(
            "description",
            format!("description must be at most {} characters", DESCRIPTION_MAX_CHARS),
        ));
    }

    let genre = match present(&submission.genre) {
        None => {
            errors.push(FieldError::missing("genre"));
            None
        }
        Some(raw) => {
            let genre = Genre::parse(&raw.to_ascii_lowercase());
            if genre.is_none() {
                let allowed: Vec<&str> = Genre::ALL.iter().map(|g| g.as_str()).collect();
                errors.push(FieldError::invalid(
                    "genre",
                    format!("genre must be one of: {}", allowed.join(", ")),
                ));
            }
            genre
        }
    };

    let tags = match parse_list("tags", present(&submission.tags)) {
        Ok(tags) => {
            if tags.len() > MAX_TAGS {
                errors.push(FieldError::invalid(
                    "tags",
                    format!("at most {} tags are allowed, got {}", MAX_TAGS, tags.len()),
                ));
            }
            if let Some(long) = tags.iter().find(|t| t.chars().count() > TAG_MAX_CHARS) {
                errors.push(FieldError::invalid(
                    "tags",
                    format!("tag '{}' exceeds {} characters", long, TAG_MAX_CHARS),
                ));
            }
            tags
        }
        Err(e) => {
            errors.push(e);
            Vec::new()
        }
    };

    let format = match present(&submission.format) {
        None => GameFormat::Html,
        Some(raw) => GameFormat::parse(&raw.to_ascii_lowercase()).unwrap_or_else(|| {
            errors.push(FieldError::invalid("format", "format must be one of: html, script"));
            GameFormat::Html
        }),
    };

    let dimensions = match present(&submission.dimensions) {
        None => Dimensions::TwoD,
        Some(raw) => Dimensions::parse(&raw.to_ascii_lowercase()).unwrap_or_else(|| {
            errors.push(FieldError::invalid("dimensions", "dimensions must be one of: 2d, 3d"));
            Dimensions::TwoD
        }),
    };

    let libs = parse_list("libs", present(&submission.libs)).unwrap_or_else(|e| {
        errors.push(e);
        Vec::new()
    });

    let declared_tier = match present(&submission.tier) {
        None => None,
        Some(raw) => {
            let tier = Tier::parse(&raw.to_ascii_lowercase());
            if tier.is_none() {
                let allowed: Vec<&str> = Tier::ALL.iter().map(|t| t.as_str()).collect();
                errors.push(FieldError::invalid(
                    "tier",
                    format!("tier must be one of: {}", allowed.join(", ")),
                ));
            }
            tier
        }
    };

    let kind = match submission.game_file.as_ref().filter(|f| !f.is_empty()) {
        Some(file) => Some(sniff_kind(file, format)),
        None => {
            errors.push(FieldError::missing("game_file"));
            None
        }
    };
    if !submission.thumbnail.as_ref().is_some_and(|f| !f.is_empty()) {
        errors.push(FieldError::missing("thumbnail"));
    }

    let is_bundle = kind == Some(ArtifactKind::ZipBundle);
    if is_bundle && present(&submission.tier).is_none() {
        errors.push(FieldError {
            field: "tier",
            reason: SubReason::MissingField,
            message: "tier is required for zip asset bundles".to_string(),
        });
    }

    if let Some(first) = errors.first() {
        let message = if errors.len() == 1 {
            first.message.clone()
        } else {
            format!("{} (and {} more field errors)", first.message, errors.len() - 1)
        };
        return Err(Rejection::request(first.reason, message)
            .with_detail("field", first.field)
            .with_detail("errors", &errors));
    }

    Ok(NormalizedFields {
        title,
        description,
        // a missing genre always produced an error above
        genre: genre.unwrap_or(Genre::Other),
        tags,
        format,
        dimensions,
        libs,
        tier: if is_bundle { declared_tier } else { None },
    })
}
