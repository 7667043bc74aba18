//! Prometheus metrics collection and HTTP request instrumentation.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, Response},
    middleware::Next,
};

use crate::error::{AppError, Rejection, Result};

/// Install the global Prometheus recorder and return the handle for rendering.
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| AppError::Internal(format!("failed to install Prometheus recorder: {}", e)))
}

/// A handle backed by a recorder that is not installed globally.
///
/// Used where several routers share a process, such as tests.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Axum middleware that records HTTP request metrics.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone().to_string();
    let path = request.uri().path().to_string();
    let normalized = normalize_path(&path);

    let start = Instant::now();
    counter!("cm_http_requests_total", "method" => method.clone(), "path" => normalized.clone())
        .increment(1);
    gauge!("cm_http_requests_in_flight", "method" => method.clone(), "path" => normalized.clone())
        .increment(1.0);

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    histogram!("cm_http_request_duration_seconds", "method" => method.clone(), "path" => normalized.clone(), "status" => status).record(duration);
    gauge!("cm_http_requests_in_flight", "method" => method, "path" => normalized).decrement(1.0);

    response
}

/// Collapse game ids and stored file keys so labels stay low-cardinality.
fn normalize_path(path: &str) -> String {
    if path.starts_with("/files/") {
        return "/files/:key".to_string();
    }
    path.split('/')
        .map(|seg| {
            if seg.len() == 36 && seg.chars().filter(|c| *c == '-').count() == 4 {
                ":id"
            } else {
                seg
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Record the terminal outcome of one submission.
pub fn record_submission(outcome: &str, duration_secs: f64) {
    counter!("cm_submissions_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("cm_submission_duration_seconds", "outcome" => outcome.to_string())
        .record(duration_secs);
}

/// Record a validation rejection by stage and code.
pub fn record_rejection(rejection: &Rejection) {
    let stage = rejection.stage.map(|s| s.as_str()).unwrap_or("unknown");
    let reason = rejection.reason.map(|r| r.as_str()).unwrap_or("none");
    counter!(
        "cm_submission_rejections_total",
        "stage" => stage,
        "code" => rejection.code.as_str(),
        "reason" => reason
    )
    .increment(1);
}

/// Record the size of a published game file.
pub fn record_publish(format: &str, size_bytes: u64) {
    histogram!("cm_published_bytes", "format" => format.to_string()).record(size_bytes as f64);
}

/// Update database connection pool gauge metrics.
pub fn set_db_pool_gauges(pool: &sqlx::SqlitePool) {
    let size = pool.size() as f64;
    let idle = pool.num_idle() as f64;
    gauge!("cm_db_pool_connections_active").set(size - idle);
    gauge!("cm_db_pool_connections_idle").set(idle);
}
