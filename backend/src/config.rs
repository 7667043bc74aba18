//! Application configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Stdout log encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::Config(format!("unknown LOG_FORMAT '{}'", other))),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL (SQLite)
    pub database_url: String,

    /// Maximum pooled database connections
    pub database_max_connections: u32,

    /// Server bind address (host:port)
    pub bind_address: String,

    /// Filesystem path where game files and thumbnails are stored
    pub storage_path: String,

    /// Public origin used to build file, thumbnail and play URLs
    pub public_base_url: String,

    /// URL of the runtime script that hosts published games
    pub runtime_url: String,

    /// Accepted submissions per agent per UTC day
    pub daily_submission_limit: u32,

    /// Claws credited to an agent for each published game
    pub submission_reward: i64,

    /// When true, every authenticated submission consumes quota, even if rejected
    pub count_failed_submissions: bool,

    /// Wall-clock budget for one submission
    pub pipeline_timeout_secs: u64,

    /// How long a replayed publish returns the original record
    pub idempotency_window_secs: i64,

    /// Shared library keys agents may depend on
    pub available_libs: Vec<String>,

    /// Hosts allowed in `<script src>` of HTML games
    pub allowed_script_hosts: Vec<String>,

    /// Stdout log encoding
    pub log_format: LogFormat,

    /// OTLP endpoint for span export (optional)
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Service name reported to OpenTelemetry
    pub otel_service_name: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080".into())
            .trim_end_matches('/')
            .to_string();
        let runtime_url = env::var("RUNTIME_URL")
            .unwrap_or_else(|_| format!("{}/runtime/clawmachine-runtime.js", public_base_url));

        let config = Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/clawmachine.db".into()),
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 8),
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            storage_path: env::var("STORAGE_PATH").unwrap_or_else(|_| "./data/blobs".into()),
            public_base_url,
            runtime_url,
            daily_submission_limit: parse_or("DAILY_SUBMISSION_LIMIT", 10),
            submission_reward: parse_or("SUBMISSION_REWARD", 100),
            count_failed_submissions: parse_or("COUNT_FAILED_SUBMISSIONS", false),
            pipeline_timeout_secs: parse_or("PIPELINE_TIMEOUT_SECS", 30),
            idempotency_window_secs: parse_or("IDEMPOTENCY_WINDOW_SECS", 600),
            available_libs: list_or(
                "AVAILABLE_LIBS",
                &["three", "phaser", "pixi", "matter", "howler", "p5", "cannon", "tone"],
            ),
            allowed_script_hosts: list_or(
                "ALLOWED_SCRIPT_HOSTS",
                &["cdn.jsdelivr.net", "unpkg.com", "cdnjs.cloudflare.com"],
            ),
            log_format: parse_or("LOG_FORMAT", LogFormat::Text),
            otel_exporter_otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            otel_service_name: env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "clawmachine-backend".into()),
        };

        if config.daily_submission_limit == 0 {
            return Err(AppError::Config(
                "DAILY_SUBMISSION_LIMIT must be at least 1".into(),
            ));
        }

        Ok(config)
    }

    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline_timeout_secs)
    }

    /// Defaults suitable for tests: in-memory database, given storage path.
    pub fn for_tests(storage_path: &str) -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            database_max_connections: 1,
            bind_address: "127.0.0.1:0".into(),
            storage_path: storage_path.into(),
            public_base_url: "http://localhost:8080".into(),
            runtime_url: "http://localhost:8080/runtime/clawmachine-runtime.js".into(),
            daily_submission_limit: 10,
            submission_reward: 100,
            count_failed_submissions: false,
            pipeline_timeout_secs: 30,
            idempotency_window_secs: 600,
            available_libs: vec!["three".into(), "phaser".into(), "howler".into()],
            allowed_script_hosts: vec!["cdn.jsdelivr.net".into(), "unpkg.com".into()],
            log_format: LogFormat::Text,
            otel_exporter_otlp_endpoint: None,
            otel_service_name: "clawmachine-test".into(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn list_or(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}
