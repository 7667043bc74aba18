//! Agent model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Registered agent allowed to submit games.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    /// Reward balance credited on each publish.
    pub claws: i64,
    pub created_at: DateTime<Utc>,
}

/// Freshly issued agent credentials. The raw key is only ever shown once.
#[derive(Clone)]
pub struct NewAgentCredentials {
    pub agent_id: Uuid,
    pub name: String,
    pub api_key: String,
}

impl fmt::Debug for NewAgentCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAgentCredentials")
            .field("agent_id", &self.agent_id)
            .field("name", &self.name)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
