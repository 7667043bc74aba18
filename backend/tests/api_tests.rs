//! HTTP surface: authentication, quota headers, catalogue reads and ambient endpoints.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use clawmachine_backend::api::routes::create_router;
use clawmachine_backend::services::metrics_service;

use common::fixtures::{html_form, script_form, valid_script, Form};
use common::TestContext;

// ---------------------------------------------------------------------------
// Authentication and quota headers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_missing_api_key_is_unauthorized() {
    let ctx = TestContext::new().await;

    let res = ctx.submit_with(&script_form("Snake"), &[]).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json["success"], false);
    assert_eq!(res.error_code(), "UNAUTHORIZED");
    assert_eq!(res.header("x-ratelimit-limit"), Some("10"));
    assert_eq!(res.header("x-ratelimit-remaining"), Some("10"));
    assert_eq!(ctx.game_count().await, 0);
}

#[tokio::test]
async fn test_unknown_api_key_is_unauthorized() {
    let ctx = TestContext::new().await;

    let res = ctx
        .submit_with(&script_form("Snake"), &[("x-api-key", "cm_not-a-real-key")])
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error_code(), "UNAUTHORIZED");
}

#[tokio::test]
async fn test_bearer_token_accepted() {
    let ctx = TestContext::new().await;
    let bearer = format!("Bearer {}", ctx.agent.api_key);

    let res = ctx
        .submit_with(&script_form("Snake"), &[("authorization", bearer.as_str())])
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.json);
}

#[tokio::test]
async fn test_rate_limited_response_carries_retry_after() {
    let ctx = TestContext::new().await;
    ctx.set_quota_used(10).await;

    let res = ctx.submit(&script_form("One too many")).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.error_code(), "RATE_LIMITED");
    assert_eq!(res.header("x-ratelimit-remaining"), Some("0"));

    let retry_after: i64 = res.header("retry-after").unwrap().parse().unwrap();
    assert!(retry_after >= 1 && retry_after <= 86_400);
    let reset: i64 = res.header("x-ratelimit-reset").unwrap().parse().unwrap();
    assert_eq!(reset % 86_400, 0, "resets at UTC midnight");
}

#[tokio::test]
async fn test_malformed_multipart_is_invalid_request() {
    let ctx = TestContext::new().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/games")
        .header("x-api-key", ctx.agent.api_key.as_str())
        .header("content-type", Form::new().content_type())
        .body(Body::from("--not-the-boundary\r\ngarbage"))
        .unwrap();

    let res = ctx.send(request).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_code(), "INVALID_REQUEST");
}

#[tokio::test]
async fn test_empty_form_lists_every_missing_field() {
    let ctx = TestContext::new().await;

    let res = ctx.submit(&Form::new().text("description", "nothing else")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = res.json["error"]["details"]["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["title", "genre", "game_file", "thumbnail"]);
}

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_get_published_game() {
    let ctx = TestContext::new().await;
    let published = ctx.submit(&script_form("Snake")).await;
    let id = published.json["data"]["game"]["id"].as_str().unwrap().to_string();

    let res = ctx.get(&format!("/api/games/{}", id)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["success"], true);
    assert_eq!(res.json["data"]["game"], published.json["data"]["game"]);
}

#[tokio::test]
async fn test_get_unknown_game_is_not_found() {
    let ctx = TestContext::new().await;

    let res = ctx.get(&format!("/api/games/{}", Uuid::new_v4())).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.error_code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_list_games_paginates_newest_first() {
    let ctx = TestContext::new().await;
    for title in ["First", "Second", "Third"] {
        let res = ctx.submit(&script_form(title)).await;
        assert_eq!(res.status, StatusCode::CREATED);
    }

    let res = ctx.get("/api/games?per_page=2").await;
    assert_eq!(res.status, StatusCode::OK);
    let data = &res.json["data"];
    assert_eq!(data["games"].as_array().unwrap().len(), 2);
    assert_eq!(data["games"][0]["title"], "Third");
    assert_eq!(data["pagination"]["total"], 3);
    assert_eq!(data["pagination"]["total_pages"], 2);

    let res = ctx.get("/api/games?per_page=2&page=2").await;
    assert_eq!(res.json["data"]["games"][0]["title"], "First");
}

#[tokio::test]
async fn test_list_games_filters_by_genre() {
    let ctx = TestContext::new().await;
    ctx.submit(&script_form("Arcade game")).await;
    ctx.submit(&html_form("Puzzle game")).await;

    let res = ctx.get("/api/games?genre=puzzle").await;
    let games = res.json["data"]["games"].as_array().unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0]["title"], "Puzzle game");

    let res = ctx.get("/api/games?genre=racing-sim").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_code(), "INVALID_REQUEST");
}

#[tokio::test]
async fn test_list_libs() {
    let ctx = TestContext::new().await;

    let res = ctx.get("/api/libs").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["data"]["libs"], json!(["howler", "phaser", "three"]));
}

// ---------------------------------------------------------------------------
// Published files
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_published_file_served_sandboxed() {
    let ctx = TestContext::new().await;
    let published = ctx.submit(&script_form("Snake")).await;
    let file_url = published.json["data"]["game"]["fileUrl"].as_str().unwrap();
    let path = file_url
        .strip_prefix(&ctx.state.config.public_base_url)
        .unwrap();
    assert!(path.starts_with("/files/games/"));

    let (status, headers, body) = ctx.get_raw(path).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, valid_script().into_bytes());
    assert_eq!(headers["content-type"], "text/javascript; charset=utf-8");
    assert!(headers["content-security-policy"]
        .to_str()
        .unwrap()
        .starts_with("sandbox"));
    assert!(headers.get("x-frame-options").is_none());
}

#[tokio::test]
async fn test_thumbnail_served_as_image() {
    let ctx = TestContext::new().await;
    let published = ctx.submit(&script_form("Snake")).await;
    let url = published.json["data"]["game"]["thumbnailUrl"].as_str().unwrap();
    let path = url.strip_prefix(&ctx.state.config.public_base_url).unwrap();

    let (status, headers, _) = ctx.get_raw(path).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "image/png");
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let ctx = TestContext::new().await;

    let res = ctx.get("/files/games/nope/game.js").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Ambient endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_reports_dependencies() {
    let ctx = TestContext::new().await;

    let res = ctx.get("/health").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["status"], "healthy");
    assert_eq!(res.json["checks"]["database"]["status"], "healthy");
    assert_eq!(res.json["checks"]["storage"]["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_not_found_without_recorder() {
    let ctx = TestContext::new().await;

    let (status, _, _) = ctx.get_raw("/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_rendered_with_recorder() {
    let ctx = TestContext::new().await;
    let mut state = (*ctx.state).clone();
    state.set_metrics_handle(metrics_service::detached_handle());
    let app = create_router(Arc::new(state));

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}

#[tokio::test]
async fn test_openapi_document_served() {
    let ctx = TestContext::new().await;

    let res = ctx.get("/api/openapi.json").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["info"]["title"], "Clawmachine API");
    assert!(res.json["paths"]["/api/games"]["post"].is_object());
}

#[tokio::test]
async fn test_api_responses_carry_security_headers() {
    let ctx = TestContext::new().await;

    let res = ctx.get("/api/libs").await;
    assert_eq!(res.header("x-content-type-options"), Some("nosniff"));
    assert_eq!(res.header("x-frame-options"), Some("DENY"));
    assert!(res
        .header("content-security-policy")
        .unwrap()
        .contains("default-src 'none'"));
}

#[tokio::test]
async fn test_correlation_id_echoed() {
    let ctx = TestContext::new().await;
    let request = Request::builder()
        .uri("/health")
        .header("x-correlation-id", "req-42")
        .body(Body::empty())
        .unwrap();

    let res = ctx.send(request).await;
    assert_eq!(res.header("x-correlation-id"), Some("req-42"));

    let res = ctx.get("/health").await;
    assert!(!res.header("x-correlation-id").unwrap_or_default().is_empty());
}
