//! Per-agent daily submission quota.
//!
//! One counter row per agent per UTC day. Consumption is a single conditional
//! `UPDATE ... WHERE count < limit`, so concurrent submissions near the limit
//! can never push the counter past it.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::quota::{next_reset, quota_day, QuotaStatus};

#[derive(Clone)]
pub struct QuotaService {
    db: SqlitePool,
    limit: u32,
}

impl QuotaService {
    pub fn new(db: SqlitePool, limit: u32) -> Self {
        Self { db, limit }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Snapshot reporting a full allowance, for callers without an agent.
    pub fn unused_status(&self, now: DateTime<Utc>) -> QuotaStatus {
        QuotaStatus {
            limit: self.limit,
            used: 0,
            resets_at: next_reset(now),
        }
    }

    /// Current quota for `agent_id` on the UTC day containing `now`.
    pub async fn status(&self, agent_id: Uuid, now: DateTime<Utc>) -> Result<QuotaStatus> {
        let used: Option<i64> = sqlx::query_scalar(
            "SELECT count FROM submission_quota WHERE agent_id = ? AND day = ?",
        )
        .bind(agent_id)
        .bind(quota_day(now))
        .fetch_optional(&self.db)
        .await?;

        Ok(QuotaStatus {
            limit: self.limit,
            used: used.unwrap_or(0).clamp(0, u32::MAX as i64) as u32,
            resets_at: next_reset(now),
        })
    }

    /// Fail with `RATE_LIMITED` when no submission is left today. Read only.
    pub async fn check(&self, agent_id: Uuid, now: DateTime<Utc>) -> Result<QuotaStatus> {
        let status = self.status(agent_id, now).await?;
        if status.is_exhausted() {
            return Err(AppError::RateLimited(status));
        }
        Ok(status)
    }

    /// Create today's counter row if missing.
    ///
    /// This is a write even when the row exists, so inside a transaction it
    /// takes the database write lock.
    pub async fn ensure_counter(
        &self,
        conn: &mut SqliteConnection,
        agent_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO submission_quota (agent_id, day, count) VALUES (?, ?, 0) \
             ON CONFLICT (agent_id, day) DO NOTHING",
        )
        .bind(agent_id)
        .bind(quota_day(now))
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Atomically take one submission from today's allowance on `conn`.
    ///
    /// Run inside the publish transaction so the increment commits or rolls
    /// back with the game record.
    pub async fn try_consume(
        &self,
        conn: &mut SqliteConnection,
        agent_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<QuotaStatus> {
        let day = quota_day(now);
        self.ensure_counter(conn, agent_id, now).await?;

        let updated: Option<i64> = sqlx::query_scalar(
            "UPDATE submission_quota SET count = count + 1 \
             WHERE agent_id = ? AND day = ? AND count < ? RETURNING count",
        )
        .bind(agent_id)
        .bind(&day)
        .bind(self.limit as i64)
        .fetch_optional(&mut *conn)
        .await?;

        match updated {
            Some(used) => Ok(QuotaStatus {
                limit: self.limit,
                used: used as u32,
                resets_at: next_reset(now),
            }),
            None => Err(AppError::RateLimited(QuotaStatus {
                limit: self.limit,
                used: self.limit,
                resets_at: next_reset(now),
            })),
        }
    }

    /// Consume quota outside any other transaction.
    pub async fn consume(&self, agent_id: Uuid, now: DateTime<Utc>) -> Result<QuotaStatus> {
        let mut conn = self.db.acquire().await?;
        self.try_consume(&mut conn, agent_id, now).await
    }
}
