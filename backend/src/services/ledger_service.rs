//! Claw reward ledger.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Ledger reason recorded for publish rewards.
pub const PUBLISH_REWARD_REASON: &str = "game_published";

/// Credits rewards to agents.
///
/// Credits are written on the caller's connection so they share the caller's
/// transaction.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn credit(
        &self,
        conn: &mut SqliteConnection,
        agent_id: Uuid,
        amount: i64,
        reference_id: Uuid,
    ) -> Result<()>;
}

/// Ledger backed by the `claw_ledger` table and `agents.claws` balance.
#[derive(Debug, Clone, Default)]
pub struct SqlLedger;

#[async_trait]
impl Ledger for SqlLedger {
    async fn credit(
        &self,
        conn: &mut SqliteConnection,
        agent_id: Uuid,
        amount: i64,
        reference_id: Uuid,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO claw_ledger (id, agent_id, amount, reason, reference_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(agent_id)
        .bind(amount)
        .bind(PUBLISH_REWARD_REASON)
        .bind(reference_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        let result = sqlx::query("UPDATE agents SET claws = claws + ? WHERE id = ?")
            .bind(amount)
            .bind(agent_id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() != 1 {
            return Err(AppError::Database(format!(
                "credit target agent {} does not exist",
                agent_id
            )));
        }

        tracing::debug!(agent_id = %agent_id, amount, reference_id = %reference_id, "Claws credited");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn test_credit_updates_balance_and_history() {
        let pool = db::create_pool("sqlite::memory:", 1).await.unwrap();
        db::migrate(&pool).await.unwrap();
        let agent = Uuid::new_v4();
        sqlx::query("INSERT INTO agents (id, name, api_key_hash, claws, created_at) VALUES (?, 'l', 'h', 5, ?)")
            .bind(agent)
            .bind(Utc::now())
            .execute(&pool)
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        SqlLedger.credit(&mut conn, agent, 100, Uuid::new_v4()).await.unwrap();
        drop(conn);

        let claws: i64 = sqlx::query_scalar("SELECT claws FROM agents WHERE id = ?")
            .bind(agent)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(claws, 105);
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM claw_ledger WHERE agent_id = ?")
            .bind(agent)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_credit_unknown_agent_fails() {
        let pool = db::create_pool("sqlite::memory:", 1).await.unwrap();
        db::migrate(&pool).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        // foreign key rejects the ledger row before the balance update runs
        assert!(SqlLedger
            .credit(&mut conn, Uuid::new_v4(), 1, Uuid::new_v4())
            .await
            .is_err());
    }
}
