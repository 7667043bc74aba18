//! Execution of the operator subcommands.

use sqlx::SqlitePool;

use crate::cli::args::{error, output};
use crate::config::Config;
use crate::db;
use crate::error::Result;
use crate::services::auth_service::AuthService;

/// Open the database and bring the schema up to date.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    db::migrate(&pool).await?;
    Ok(pool)
}

/// `migrate`: apply pending migrations.
pub async fn run_migrate(config: &Config, format: &str) -> Result<()> {
    connect(config).await?;
    output(format, "Database migrations complete", None);
    Ok(())
}

/// `create-agent`: register an agent and print its one-time API key.
pub async fn run_create_agent(config: &Config, format: &str, name: &str) -> Result<()> {
    let pool = connect(config).await?;
    let auth = AuthService::new(pool);

    match auth.create_agent(name).await {
        Ok(creds) => {
            output(
                format,
                &format!(
                    "Created agent {} ({})\nAPI key (shown once): {}",
                    creds.name, creds.agent_id, creds.api_key
                ),
                Some(serde_json::json!({
                    "agent_id": creds.agent_id,
                    "name": creds.name,
                    "api_key": creds.api_key,
                })),
            );
            Ok(())
        }
        Err(e) => {
            error(format, &e.to_string());
            Err(e)
        }
    }
}
