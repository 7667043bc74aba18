//! API module - HTTP handlers and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::services::auth_service::AuthService;
use crate::services::game_service::GameService;
use crate::services::ledger_service::{Ledger, SqlLedger};
use crate::services::library_registry::{LibraryRegistry, StaticLibraryRegistry};
use crate::services::publish_service::PublishService;
use crate::services::quota_service::QuotaService;
use crate::services::submission_service::SubmissionService;
use crate::storage::StorageBackend;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: SqlitePool,
    pub storage: Arc<dyn StorageBackend>,
    pub auth: Arc<AuthService>,
    pub quota: QuotaService,
    pub games: GameService,
    pub libraries: Arc<dyn LibraryRegistry>,
    pub submissions: SubmissionService,
    pub metrics_handle: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    pub fn new(config: Config, db: SqlitePool, storage: Arc<dyn StorageBackend>) -> Self {
        Self::with_ledger(config, db, storage, Arc::new(SqlLedger))
    }

    /// Create state with a specific reward ledger.
    pub fn with_ledger(
        config: Config,
        db: SqlitePool,
        storage: Arc<dyn StorageBackend>,
        ledger: Arc<dyn Ledger>,
    ) -> Self {
        let quota = QuotaService::new(db.clone(), config.daily_submission_limit);
        let libraries: Arc<dyn LibraryRegistry> =
            Arc::new(StaticLibraryRegistry::new(config.available_libs.clone()));
        let publisher = PublishService::new(
            db.clone(),
            storage.clone(),
            ledger,
            quota.clone(),
            config.submission_reward,
            config.public_base_url.clone(),
            config.runtime_url.clone(),
            config.idempotency_window_secs,
        );
        let submissions = SubmissionService::new(
            quota.clone(),
            libraries.clone(),
            publisher,
            config.allowed_script_hosts.clone(),
            config.count_failed_submissions,
            config.pipeline_timeout(),
        );

        Self {
            auth: Arc::new(AuthService::new(db.clone())),
            games: GameService::new(db.clone()),
            quota,
            libraries,
            submissions,
            storage,
            db,
            config,
            metrics_handle: None,
        }
    }

    /// Set the Prometheus metrics handle for rendering /metrics output.
    pub fn set_metrics_handle(&mut self, handle: PrometheusHandle) {
        self.metrics_handle = Some(Arc::new(handle));
    }
}

pub type SharedState = Arc<AppState>;
