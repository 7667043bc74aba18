//! Submission pipeline.
//!
//! Runs the stages in a fixed order and stops at the first failure:
//! fields, rate limit, classify, structure, source, thumbnail, libraries,
//! publish. A submission that would fail several checks always reports the
//! earliest one. The content stages are pure and run on the blocking pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AppError, ErrorCode, Rejection, Result, SubReason};
use crate::formats::bundle::validate_bundle;
use crate::formats::html::{decode_utf8, validate_html};
use crate::formats::thumbnail::{validate_thumbnail, ImageInfo};
use crate::formats::{classify, Artifact, ArtifactKind};
use crate::models::game::GameRecord;
use crate::models::submission::{
    NormalizedFields, Stage, Submission, UploadedFile, Warning, WarningCode,
};
use crate::scanner::{scan, ScanMode};
use crate::services::field_validator::validate_fields;
use crate::services::library_registry::LibraryRegistry;
use crate::services::metrics_service;
use crate::services::publish_service::{PublishOutcome, PublishRequest, PublishService};
use crate::services::quota_service::QuotaService;

/// Result of a submission that reached the publisher.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub game: GameRecord,
    pub warnings: Vec<Warning>,
    /// True when an earlier identical publish was returned instead.
    pub replayed: bool,
}

/// Output of the content stages, ready to publish.
#[derive(Debug, Clone)]
pub struct ValidatedContent {
    pub artifact: Artifact,
    pub thumbnail: ImageInfo,
    pub warnings: Vec<Warning>,
}

#[derive(Clone)]
pub struct SubmissionService {
    quota: QuotaService,
    libraries: Arc<dyn LibraryRegistry>,
    publisher: PublishService,
    allowed_script_hosts: Arc<Vec<String>>,
    count_failed_submissions: bool,
    timeout: Duration,
}

impl SubmissionService {
    pub fn new(
        quota: QuotaService,
        libraries: Arc<dyn LibraryRegistry>,
        publisher: PublishService,
        allowed_script_hosts: Vec<String>,
        count_failed_submissions: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            quota,
            libraries,
            publisher,
            allowed_script_hosts: Arc::new(allowed_script_hosts),
            count_failed_submissions,
            timeout,
        }
    }

    /// Run the whole pipeline for one submission under the time budget.
    pub async fn submit(&self, agent_id: Uuid, submission: Submission) -> Result<SubmissionOutcome> {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.run(agent_id, submission)).await
        {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(self.timeout)),
        };
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(outcome) => {
                let label = if outcome.replayed { "replayed" } else { "published" };
                metrics_service::record_submission(label, elapsed);
            }
            Err(AppError::Rejected(rejection)) => {
                tracing::info!(
                    agent_id = %agent_id,
                    stage = %rejection.stage.map(|s| s.as_str()).unwrap_or("unknown"),
                    code = %rejection.code,
                    reason = ?rejection.reason,
                    "Submission rejected"
                );
                metrics_service::record_rejection(rejection);
                metrics_service::record_submission("rejected", elapsed);
            }
            Err(AppError::RateLimited(status)) => {
                tracing::info!(
                    agent_id = %agent_id,
                    stage = %Stage::RateLimit,
                    used = status.used,
                    limit = status.limit,
                    "Submission rate limited"
                );
                metrics_service::record_submission("rate_limited", elapsed);
            }
            Err(e) => {
                tracing::warn!(agent_id = %agent_id, error = %e, "Submission failed");
                metrics_service::record_submission("error", elapsed);
            }
        }
        result
    }

    async fn run(&self, agent_id: Uuid, submission: Submission) -> Result<SubmissionOutcome> {
        let fields = validate_fields(&submission).map_err(|r| r.at(Stage::Fields))?;

        let idempotency_key = idempotency_key(agent_id, &submission, &fields);

        let now = Utc::now();
        if self.count_failed_submissions
            && self
                .publisher
                .find_replay(agent_id, &idempotency_key)
                .await?
                .is_none()
        {
            self.quota.consume(agent_id, now).await?;
        } else {
            self.quota.check(agent_id, now).await?;
        }

        let format_declared = submission
            .format
            .as_deref()
            .is_some_and(|f| !f.trim().is_empty());
        let (game_file, thumbnail) = match (submission.game_file, submission.thumbnail) {
            (Some(g), Some(t)) => (g, t),
            _ => return Err(AppError::Internal("file parts vanished after validation".into())),
        };
        let thumbnail_bytes = thumbnail.bytes.clone();

        let hosts = self.allowed_script_hosts.clone();
        let libraries = self.libraries.clone();
        let content_fields = fields.clone();
        let content = tokio::task::spawn_blocking(move || {
            validate_content(
                &content_fields,
                format_declared,
                &game_file,
                &thumbnail,
                &hosts,
                libraries.as_ref(),
            )
        })
        .await
        .map_err(|e| AppError::Internal(format!("validation task failed: {}", e)))??;

        let outcome = self
            .publisher
            .publish(PublishRequest {
                agent_id,
                fields: &fields,
                artifact: &content.artifact,
                thumbnail: thumbnail_bytes,
                thumbnail_format: content.thumbnail.format,
                idempotency_key,
                consume_quota: !self.count_failed_submissions,
            })
            .await?;

        if let PublishOutcome::Created(record) = &outcome {
            metrics_service::record_publish(record.format.as_str(), content.artifact.size_bytes);
        }
        let replayed = matches!(outcome, PublishOutcome::Replayed(_));
        Ok(SubmissionOutcome {
            game: outcome.into_record(),
            warnings: content.warnings,
            replayed,
        })
    }
}

/// Stages 3 to 7: classify, structure, source, thumbnail, libraries.
pub fn validate_content(
    fields: &NormalizedFields,
    format_declared: bool,
    game_file: &UploadedFile,
    thumbnail: &UploadedFile,
    allowed_script_hosts: &[String],
    libraries: &dyn LibraryRegistry,
) -> std::result::Result<ValidatedContent, Rejection> {
    let mut warnings = Vec::new();

    let artifact = classify(game_file, fields).map_err(|r| r.at(Stage::Classify))?;
    let published = artifact.kind.published_format();
    if format_declared && published != fields.format {
        warnings.push(Warning::new(
            WarningCode::FormatMismatch,
            format!(
                "Declared format '{}' does not match the uploaded file; published as '{}'",
                fields.format.as_str(),
                published.as_str()
            ),
        ));
    }

    let (source, mode) = match artifact.kind {
        ArtifactKind::Html => {
            let doc = validate_html(&artifact.bytes, fields.dimensions, allowed_script_hosts)
                .map_err(|r| r.at(Stage::Structure))?;
            (
                doc.script_source(),
                ScanMode::Html {
                    has_viewport: doc.has_viewport,
                },
            )
        }
        ArtifactKind::Script => {
            let source = decode_utf8(&artifact.bytes, "Script game file")
                .map_err(|r| r.at(Stage::Structure))?;
            (source, ScanMode::Script)
        }
        ArtifactKind::ZipBundle => {
            let report = validate_bundle(&artifact.bytes, artifact.ceiling_bytes)
                .map_err(|r| r.at(Stage::Structure))?;
            tracing::debug!(
                entries = report.entries.len(),
                total_bytes = report.total_bytes,
                "Bundle layout accepted"
            );
            (report.game_js, ScanMode::Script)
        }
    };

    let report = scan(&source, mode).map_err(|r| r.at(Stage::Source))?;
    warnings.extend(report.warnings);

    let thumbnail = validate_thumbnail(&thumbnail.bytes, thumbnail.truncated)
        .map_err(|r| r.at(Stage::Thumbnail))?;

    let unknown: Vec<&str> = fields
        .libs
        .iter()
        .filter(|lib| !libraries.contains(lib))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(Rejection::new(
            ErrorCode::InvalidLibrary,
            SubReason::UnknownLibrary,
            format!("Unknown shared libraries: {}", unknown.join(", ")),
        )
        .with_detail("unknown_libs", unknown)
        .with_detail("available_libs", libraries.list_keys())
        .at(Stage::Libraries));
    }

    Ok(ValidatedContent {
        artifact,
        thumbnail,
        warnings,
    })
}

/// Key identifying a publish for replay detection.
///
/// An explicit `Idempotency-Key` header wins; otherwise the key is derived
/// from the content and normalised fields.
pub fn idempotency_key(agent_id: Uuid, submission: &Submission, fields: &NormalizedFields) -> String {
    let mut hasher = Sha256::new();
    hasher.update(agent_id.as_bytes());
    match submission.idempotency_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => {
            hasher.update(b"header\0");
            hasher.update(key.as_bytes());
        }
        _ => {
            hasher.update(b"content\0");
            for file in [&submission.game_file, &submission.thumbnail] {
                let bytes = file.as_ref().map(|f| f.bytes.clone()).unwrap_or_else(Bytes::new);
                hasher.update((bytes.len() as u64).to_be_bytes());
                hasher.update(&bytes);
            }
            let normalized = json!({
                "title": fields.title,
                "description": fields.description,
                "genre": fields.genre,
                "tags": fields.tags,
                "format": fields.format,
                "dimensions": fields.dimensions,
                "libs": fields.libs,
                "tier": fields.tier,
            });
            hasher.update(normalized.to_string().as_bytes());
        }
    }
    format!("{:x}", hasher.finalize())
}
