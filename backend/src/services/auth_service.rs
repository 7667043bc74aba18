//! Agent authentication service.
//!
//! Agents authenticate with an opaque API key. Only the SHA-256 digest of the
//! key is stored; the raw key is returned once, when the agent is created.

use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::agent::{Agent, NewAgentCredentials};

/// Prefix carried by every issued API key.
pub const API_KEY_PREFIX: &str = "cm_";
const API_KEY_RANDOM_LEN: usize = 32;

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: SqlitePool,
}

impl AuthService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Hash an API key for storage and lookup.
    pub fn hash_api_key(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn generate_api_key() -> String {
        let random: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(API_KEY_RANDOM_LEN)
            .map(char::from)
            .collect();
        format!("{}{}", API_KEY_PREFIX, random)
    }

    /// Resolve an API key to its agent.
    pub async fn resolve_api_key(&self, key: &str) -> Result<Agent> {
        if !key.starts_with(API_KEY_PREFIX) || key.len() <= API_KEY_PREFIX.len() {
            return Err(AppError::Unauthorized("Invalid API key".to_string()));
        }

        let hash = Self::hash_api_key(key);
        sqlx::query_as::<_, Agent>(
            "SELECT id, name, claws, created_at FROM agents WHERE api_key_hash = ?",
        )
        .bind(hash)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid API key".to_string()))
    }

    /// Register a new agent and issue its API key.
    pub async fn create_agent(&self, name: &str) -> Result<NewAgentCredentials> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Config("agent name must not be empty".to_string()));
        }

        let agent_id = Uuid::new_v4();
        let api_key = Self::generate_api_key();

        sqlx::query(
            "INSERT INTO agents (id, name, api_key_hash, claws, created_at) VALUES (?, ?, ?, 0, ?)",
        )
        .bind(agent_id)
        .bind(name)
        .bind(Self::hash_api_key(&api_key))
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Config(format!("agent '{}' already exists", name))
            }
            other => other.into(),
        })?;

        tracing::info!(agent_id = %agent_id, name = %name, "Agent created");

        Ok(NewAgentCredentials {
            agent_id,
            name: name.to_string(),
            api_key,
        })
    }

    pub async fn get_agent(&self, agent_id: Uuid) -> Result<Agent> {
        sqlx::query_as::<_, Agent>("SELECT id, name, claws, created_at FROM agents WHERE id = ?")
            .bind(agent_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("agent {}", agent_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn service() -> AuthService {
        let pool = db::create_pool("sqlite::memory:", 1).await.unwrap();
        db::migrate(&pool).await.unwrap();
        AuthService::new(pool)
    }

    #[test]
    fn test_generated_key_shape() {
        let key = AuthService::generate_api_key();
        assert!(key.starts_with("cm_"));
        assert_eq!(key.len(), 3 + 32);
        assert!(key[3..].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = AuthService::hash_api_key("cm_abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, AuthService::hash_api_key("cm_abc"));
        assert_ne!(hash, AuthService::hash_api_key("cm_abd"));
    }

    #[tokio::test]
    async fn test_create_then_resolve() {
        let auth = service().await;
        let creds = auth.create_agent("builder-bot").await.unwrap();
        let agent = auth.resolve_api_key(&creds.api_key).await.unwrap();
        assert_eq!(agent.id, creds.agent_id);
        assert_eq!(agent.claws, 0);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_keys_rejected() {
        let auth = service().await;
        auth.create_agent("a").await.unwrap();
        for key in ["", "cm_", "nope", "cm_doesnotexist"] {
            let err = auth.resolve_api_key(key).await.unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(_)), "{}", key);
        }
    }

    #[tokio::test]
    async fn test_duplicate_agent_name() {
        let auth = service().await;
        auth.create_agent("twin").await.unwrap();
        assert!(auth.create_agent("twin").await.is_err());
    }
}
