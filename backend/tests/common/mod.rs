//! Shared harness for the HTTP-level integration tests.
//!
//! Each [`TestContext`] owns a fresh database, a temporary blob directory and
//! a registered agent, and drives the real router in-process.

#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

use clawmachine_backend::api::routes::create_router;
use clawmachine_backend::api::{AppState, SharedState};
use clawmachine_backend::config::Config;
use clawmachine_backend::db;
use clawmachine_backend::models::agent::NewAgentCredentials;
use clawmachine_backend::models::quota::quota_day;
use clawmachine_backend::services::auth_service::AuthService;
use clawmachine_backend::services::ledger_service::{Ledger, SqlLedger};
use clawmachine_backend::storage::filesystem::FilesystemStorage;

use fixtures::Form;

pub struct TestContext {
    pub pool: SqlitePool,
    pub state: SharedState,
    pub app: Router,
    pub agent: NewAgentCredentials,
    pub storage_dir: TempDir,
    /// Holds the database file for file-backed contexts.
    db_dir: Option<TempDir>,
}

/// Status, headers and decoded JSON body of one response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: Value,
}

impl TestResponse {
    /// `error.code` of a failure envelope.
    pub fn error_code(&self) -> &str {
        self.json["error"]["code"].as_str().unwrap_or_default()
    }

    /// `error.details.reason` of a failure envelope.
    pub fn reason(&self) -> &str {
        self.json["error"]["details"]["reason"]
            .as_str()
            .unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestContext {
    pub async fn new() -> Self {
        Self::build(|_| {}, Arc::new(SqlLedger), false).await
    }

    pub async fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        Self::build(tweak, Arc::new(SqlLedger), false).await
    }

    pub async fn with_ledger(ledger: Arc<dyn Ledger>) -> Self {
        Self::build(|_| {}, ledger, false).await
    }

    pub async fn with_ledger_and_config(
        ledger: Arc<dyn Ledger>,
        tweak: impl FnOnce(&mut Config),
    ) -> Self {
        Self::build(tweak, ledger, false).await
    }

    /// Context on an on-disk database with a multi-connection pool.
    pub async fn file_backed(tweak: impl FnOnce(&mut Config)) -> Self {
        Self::build(tweak, Arc::new(SqlLedger), true).await
    }

    async fn build(
        tweak: impl FnOnce(&mut Config),
        ledger: Arc<dyn Ledger>,
        file_backed: bool,
    ) -> Self {
        let storage_dir = TempDir::new().expect("storage tempdir");
        let mut config = Config::for_tests(storage_dir.path().to_str().expect("utf-8 path"));

        let db_dir = if file_backed {
            let dir = TempDir::new().expect("db tempdir");
            config.database_url = format!("sqlite://{}/cm.db", dir.path().display());
            config.database_max_connections = 4;
            Some(dir)
        } else {
            None
        };
        tweak(&mut config);

        let pool = db::create_pool(&config.database_url, config.database_max_connections)
            .await
            .expect("create pool");
        db::migrate(&pool).await.expect("migrate");

        let storage = Arc::new(FilesystemStorage::new(
            storage_dir.path(),
            &config.public_base_url,
        ));
        let state: SharedState = Arc::new(AppState::with_ledger(
            config,
            pool.clone(),
            storage,
            ledger,
        ));
        let app = create_router(state.clone());

        let agent = AuthService::new(pool.clone())
            .create_agent("test-agent")
            .await
            .expect("create agent");

        Self {
            pool,
            state,
            app,
            agent,
            storage_dir,
            db_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            json,
        }
    }

    /// POST the form as the test agent.
    pub async fn submit(&self, form: &Form) -> TestResponse {
        self.submit_with(form, &[("x-api-key", self.agent.api_key.as_str())])
            .await
    }

    /// POST the form with exactly the given extra headers.
    pub async fn submit_with(&self, form: &Form, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/games")
            .header("content-type", form.content_type());
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::from(form.body())).expect("request"))
            .await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
    }

    /// Raw body of a GET, for non-JSON responses.
    pub async fn get_raw(&self, uri: &str) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = self
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, headers, bytes.to_vec())
    }

    pub async fn claws(&self) -> i64 {
        sqlx::query_scalar("SELECT claws FROM agents WHERE id = ?")
            .bind(self.agent.agent_id)
            .fetch_one(&self.pool)
            .await
            .expect("claws")
    }

    pub async fn game_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM games")
            .fetch_one(&self.pool)
            .await
            .expect("count games")
    }

    pub async fn ledger_entries(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM claw_ledger WHERE agent_id = ?")
            .bind(self.agent.agent_id)
            .fetch_one(&self.pool)
            .await
            .expect("count ledger")
    }

    /// Today's consumed quota for the test agent.
    pub async fn quota_used(&self) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "SELECT count FROM submission_quota WHERE agent_id = ? AND day = ?",
        )
        .bind(self.agent.agent_id)
        .bind(quota_day(Utc::now()))
        .fetch_optional(&self.pool)
        .await
        .expect("quota")
        .unwrap_or(0)
    }

    pub async fn set_quota_used(&self, used: i64) {
        sqlx::query(
            "INSERT INTO submission_quota (agent_id, day, count) VALUES (?, ?, ?) \
             ON CONFLICT (agent_id, day) DO UPDATE SET count = excluded.count",
        )
        .bind(self.agent.agent_id)
        .bind(quota_day(Utc::now()))
        .bind(used)
        .execute(&self.pool)
        .await
        .expect("set quota");
    }

    /// Wait for background blob cleanup to leave at most `expected` files.
    pub async fn wait_for_blob_count(&self, expected: usize) -> usize {
        for _ in 0..50 {
            if self.stored_blob_count() <= expected {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        self.stored_blob_count()
    }

    /// Number of regular files under the blob directory.
    pub fn stored_blob_count(&self) -> usize {
        fn walk(dir: &std::path::Path) -> usize {
            std::fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .flatten()
                        .map(|e| {
                            let path = e.path();
                            if path.is_dir() {
                                walk(&path)
                            } else {
                                1
                            }
                        })
                        .sum()
                })
                .unwrap_or(0)
        }
        walk(self.storage_dir.path())
    }
}
