//! Publisher, the last pipeline stage.
//!
//! Stores both blobs, then inserts the game record, consumes quota and credits
//! the reward in one database transaction. Blobs are written under a fresh
//! game id and only become reachable through a committed record, so a failed
//! commit leaves nothing visible. Blobs of an uncommitted publish are deleted,
//! including when the publish future is dropped mid-flight.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::Result;
use crate::formats::thumbnail::ImageFormat;
use crate::formats::{Artifact, ArtifactKind};
use crate::models::game::{GameRecord, GameRow, GAME_COLUMNS};
use crate::models::submission::NormalizedFields;
use crate::services::ledger_service::Ledger;
use crate::services::quota_service::QuotaService;
use crate::storage::StorageBackend;

/// Everything the publisher needs from the validated submission.
pub struct PublishRequest<'a> {
    pub agent_id: Uuid,
    pub fields: &'a NormalizedFields,
    pub artifact: &'a Artifact,
    pub thumbnail: Bytes,
    pub thumbnail_format: ImageFormat,
    pub idempotency_key: String,
    /// False when quota was already consumed earlier in the pipeline.
    pub consume_quota: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Created(GameRecord),
    /// A matching publish from the same agent already exists in the window.
    Replayed(GameRecord),
}

impl PublishOutcome {
    pub fn record(&self) -> &GameRecord {
        match self {
            PublishOutcome::Created(r) | PublishOutcome::Replayed(r) => r,
        }
    }

    pub fn into_record(self) -> GameRecord {
        match self {
            PublishOutcome::Created(r) | PublishOutcome::Replayed(r) => r,
        }
    }
}

#[derive(Clone)]
pub struct PublishService {
    db: SqlitePool,
    storage: Arc<dyn StorageBackend>,
    ledger: Arc<dyn Ledger>,
    quota: QuotaService,
    reward: i64,
    public_base_url: String,
    runtime_url: String,
    idempotency_window: Duration,
}

fn game_file_name(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Html => "game.html",
        ArtifactKind::Script => "game.js",
        ArtifactKind::ZipBundle => "game.zip",
    }
}

impl PublishService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: SqlitePool,
        storage: Arc<dyn StorageBackend>,
        ledger: Arc<dyn Ledger>,
        quota: QuotaService,
        reward: i64,
        public_base_url: String,
        runtime_url: String,
        idempotency_window_secs: i64,
    ) -> Self {
        Self {
            db,
            storage,
            ledger,
            quota,
            reward,
            public_base_url,
            runtime_url,
            idempotency_window: Duration::seconds(idempotency_window_secs.max(0)),
        }
    }

    pub async fn publish(&self, request: PublishRequest<'_>) -> Result<PublishOutcome> {
        let game_id = Uuid::new_v4();
        let now = Utc::now();
        let file_key = format!("games/{}/{}", game_id, game_file_name(request.artifact.kind));
        let thumbnail_key = format!(
            "games/{}/thumbnail.{}",
            game_id,
            request.thumbnail_format.extension()
        );

        let mut staged = StagedBlobs::new(self.storage.clone());
        staged.push(file_key.clone());
        staged.push(thumbnail_key.clone());
        let mut stored = self
            .storage
            .put(&file_key, request.artifact.bytes.clone())
            .await;
        if stored.is_ok() {
            stored = self
                .storage
                .put(&thumbnail_key, request.thumbnail.clone())
                .await;
        }
        if let Err(e) = stored {
            staged.discard().await;
            return Err(e);
        }

        let record = GameRecord {
            id: game_id,
            agent_id: request.agent_id,
            title: request.fields.title.clone(),
            description: request.fields.description.clone(),
            genre: request.fields.genre,
            tags: request.fields.tags.clone(),
            format: request.artifact.kind.published_format(),
            dimensions: request.fields.dimensions,
            tier: request.fields.tier,
            libs: request.fields.libs.clone(),
            size_bytes: request.artifact.size_bytes as i64,
            thumbnail_url: self.storage.public_url(&thumbnail_key),
            file_url: self.storage.public_url(&file_key),
            play_url: format!("{}/play/{}", self.public_base_url, game_id),
            runtime_url: self.runtime_url.clone(),
            created_at: now,
        };

        let commit = self
            .commit(&request, &record, &file_key, &thumbnail_key, now)
            .await;
        match commit {
            Ok(PublishOutcome::Created(record)) => {
                staged.keep();
                tracing::info!(
                    game_id = %record.id,
                    agent_id = %record.agent_id,
                    format = %record.format.as_str(),
                    size_bytes = record.size_bytes,
                    "Game published"
                );
                Ok(PublishOutcome::Created(record))
            }
            Ok(replayed) => {
                staged.discard().await;
                tracing::info!(
                    game_id = %replayed.record().id,
                    agent_id = %request.agent_id,
                    "Idempotent replay of earlier publish"
                );
                Ok(replayed)
            }
            Err(e) => {
                staged.discard().await;
                Err(e)
            }
        }
    }

    /// Earlier publish from this agent with the same key, if still in the window.
    pub async fn find_replay(
        &self,
        agent_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<GameRecord>> {
        let mut conn = self.db.acquire().await?;
        let cutoff = Utc::now() - self.idempotency_window;
        find_recent(&mut conn, agent_id, idempotency_key, cutoff).await
    }

    async fn commit(
        &self,
        request: &PublishRequest<'_>,
        record: &GameRecord,
        file_key: &str,
        thumbnail_key: &str,
        now: DateTime<Utc>,
    ) -> Result<PublishOutcome> {
        let mut tx = self.db.begin().await?;

        // first statement writes, so the idempotency read below is serialised
        self.quota
            .ensure_counter(&mut *tx, request.agent_id, now)
            .await?;

        let cutoff = now - self.idempotency_window;
        if let Some(existing) =
            find_recent(&mut *tx, request.agent_id, &request.idempotency_key, cutoff).await?
        {
            tx.rollback().await?;
            return Ok(PublishOutcome::Replayed(existing));
        }

        if request.consume_quota {
            self.quota
                .try_consume(&mut *tx, request.agent_id, now)
                .await?;
        }

        let mut hasher = Sha256::new();
        hasher.update(&request.artifact.bytes);
        let content_sha256 = format!("{:x}", hasher.finalize());

        sqlx::query(
            "INSERT INTO games (id, agent_id, title, description, genre, tags, format, dimensions, \
             tier, libs, size_bytes, content_sha256, file_key, thumbnail_key, file_url, \
             thumbnail_url, play_url, runtime_url, idempotency_key, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(record.agent_id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.genre)
        .bind(serde_json::to_string(&record.tags)?)
        .bind(record.format)
        .bind(record.dimensions)
        .bind(record.tier)
        .bind(serde_json::to_string(&record.libs)?)
        .bind(record.size_bytes)
        .bind(content_sha256)
        .bind(file_key)
        .bind(thumbnail_key)
        .bind(&record.file_url)
        .bind(&record.thumbnail_url)
        .bind(&record.play_url)
        .bind(&record.runtime_url)
        .bind(&request.idempotency_key)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        self.ledger
            .credit(&mut *tx, request.agent_id, self.reward, record.id)
            .await
            .map_err(|e| {
                tracing::error!(game_id = %record.id, error = %e, "Reward credit failed, rolling back publish");
                e
            })?;

        tx.commit().await?;
        Ok(PublishOutcome::Created(record.clone()))
    }
}

/// Blobs written for a publish that has not committed yet.
///
/// Dropping without [`StagedBlobs::keep`] deletes them on a background task,
/// which covers a publish cancelled by the pipeline timeout.
struct StagedBlobs {
    storage: Arc<dyn StorageBackend>,
    keys: Vec<String>,
}

impl StagedBlobs {
    fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            keys: Vec::new(),
        }
    }

    fn push(&mut self, key: String) {
        self.keys.push(key);
    }

    fn keep(mut self) {
        self.keys.clear();
    }

    async fn discard(mut self) {
        let keys = std::mem::take(&mut self.keys);
        delete_blobs(self.storage.as_ref(), &keys).await;
    }
}

impl Drop for StagedBlobs {
    fn drop(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        let keys = std::mem::take(&mut self.keys);
        let storage = self.storage.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { delete_blobs(storage.as_ref(), &keys).await });
            }
            Err(_) => tracing::warn!(keys = ?keys, "No runtime left to delete orphaned blobs"),
        }
    }
}

async fn delete_blobs(storage: &dyn StorageBackend, keys: &[String]) {
    for key in keys {
        if !storage.exists(key).await.unwrap_or(true) {
            continue;
        }
        if let Err(e) = storage.delete(key).await {
            tracing::warn!(key = %key, error = %e, "Failed to delete orphaned blob");
        }
    }
}

async fn find_recent(
    conn: &mut SqliteConnection,
    agent_id: Uuid,
    idempotency_key: &str,
    cutoff: DateTime<Utc>,
) -> Result<Option<GameRecord>> {
    let row = sqlx::query_as::<_, GameRow>(&format!(
        "SELECT {} FROM games WHERE agent_id = ? AND idempotency_key = ? AND created_at >= ? \
         ORDER BY created_at DESC LIMIT 1",
        GAME_COLUMNS
    ))
    .bind(agent_id)
    .bind(idempotency_key)
    .bind(cutoff)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(GameRecord::try_from).transpose()
}
