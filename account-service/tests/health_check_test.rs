mod common;

use account_service::services::{
    InMemoryAccountRepository, RemoteAccountClient, RemoteAccountConfig,
};
use account_service::startup::{build_router, AppState};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{seed_accounts, test_config, TestApp};
use std::sync::Arc;
use tower::ServiceExt;

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn local_installation_is_ready() {
    let app = TestApp::spawn().await;

    let response = app.client.get(app.url("/ready")).send().await.unwrap();

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ready");
    assert!(body["resolvers"].as_array().is_some_and(|r| !r.is_empty()));
}

#[tokio::test]
async fn blocked_remote_check_is_not_ready() {
    let client = RemoteAccountClient::new(RemoteAccountConfig {
        server_url: "http://127.0.0.1:9".to_string(),
        account_uuid: "unreachable".to_string(),
        fail_after: 1,
        degrade_after: 0,
        request_timeout_secs: 1,
        ..Default::default()
    })
    .unwrap();
    let client = Arc::new(client);
    assert!(client.check_account_info().await.is_err());
    assert!(client.is_blocked().await);

    let repository = Arc::new(InMemoryAccountRepository::with_accounts(seed_accounts()));
    let router = build_router(AppState::new(test_config(), repository, Some(client)));

    let response = router
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
