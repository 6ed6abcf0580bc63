mod common;

use account_service::config::AccountServiceConfig;
use account_service::middleware::request_context::PRINCIPAL_ACCOUNT_HEADER;
use account_service::models::{AccountDto, AccountStatsList, AccountStatus, AccountStats};
use account_service::services::{AccountRepository, InMemoryAccountRepository};
use account_service::startup::{build_router, AppState};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Utc;
use common::{
    seed_accounts, test_config, test_config_with, TestApp, ACME_UUID, LICENSED_INSTANCE,
    LICENSED_UUID,
};
use std::sync::Arc;
use tower::ServiceExt;

#[tokio::test]
async fn unknown_uuid_gets_canceled_placeholder() {
    let app = TestApp::spawn().await;

    let dto: AccountDto = app
        .client
        .get(app.url("/api/saas/account/nobody"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(dto.id, Some(1));
    assert_eq!(dto.status, AccountStatus::Canceled);
    assert_eq!(dto.status_description.as_deref(), Some("Invalid License"));
}

#[tokio::test]
async fn known_uuid_returns_snapshot() {
    let app = TestApp::spawn().await;

    let dto: AccountDto = app
        .client
        .get(app.url(&format!("/api/saas/account/{}", ACME_UUID)))
        .query(&[("info", "OS:linux"), ("uuid", "any")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(dto.id, Some(1));
    assert_eq!(dto.name.as_deref(), Some("Acme"));
    assert_eq!(dto.status, AccountStatus::Active);
}

#[tokio::test]
async fn instance_uuid_mismatch_is_flagged_new() {
    let app = TestApp::spawn().await;
    let url = app.url(&format!("/api/saas/account/{}", LICENSED_UUID));

    let wrong: AccountDto = app
        .client
        .get(&url)
        .query(&[("uuid", "some-other-machine")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(wrong.status, AccountStatus::New);
    assert_eq!(wrong.status_description.as_deref(), Some("Invalid License"));

    let missing: AccountDto = app.client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(missing.status, AccountStatus::New);

    let right: AccountDto = app
        .client
        .get(&url)
        .query(&[("uuid", LICENSED_INSTANCE.to_uppercase())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(right.status, AccountStatus::Active);
}

#[tokio::test]
async fn account_checks_are_logged() {
    let app = TestApp::spawn().await;
    let from = Utc::now() - chrono::Duration::minutes(1);

    app.client
        .get(app.url(&format!("/api/saas/account/{}", ACME_UUID)))
        .query(&[("info", "OS:linux")])
        .send()
        .await
        .unwrap();
    app.client
        .get(app.url(&format!("/api/saas/account/{}", ACME_UUID)))
        .header("x-forwarded-for", "203.0.113.7")
        .send()
        .await
        .unwrap();
    app.client
        .get(app.url("/api/saas/account/nobody"))
        .send()
        .await
        .unwrap();

    let logs = app.repository.find_logs(1, from, Utc::now()).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].message, "Remote account check");
    assert_eq!(logs[0].ip_address.as_deref(), Some("127.0.0.1"));
    assert_eq!(logs[0].path_info.as_deref(), Some("/api/saas/account/acme-uuid"));
    assert_eq!(logs[0].client_info.as_deref(), Some("OS:linux"));
    assert_eq!(logs[1].ip_address.as_deref(), Some("203.0.113.7"));
    assert_eq!(logs[1].client_info, None);
}

#[tokio::test]
async fn missing_parameter_is_created_from_default() {
    let app = TestApp::spawn().await;
    let url = app.url(&format!("/api/saas/account/{}/parameter/theme", ACME_UUID));

    let empty = app.client.get(&url).send().await.unwrap().text().await.unwrap();
    assert_eq!(empty, "");
    assert!(app.repository.find_parameter(1, "theme").await.unwrap().is_none());

    let created = app
        .client
        .get(&url)
        .query(&[("defaultValue", "dark")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(created, "dark");

    let stored = app
        .client
        .get(&url)
        .query(&[("defaultValue", "light")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(stored, "dark");

    let parameter = app.repository.find_parameter(1, "theme").await.unwrap().unwrap();
    assert_eq!(parameter.value.as_deref(), Some("dark"));
}

#[tokio::test]
async fn parameter_of_unknown_account_is_empty() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/api/saas/account/ghost/parameter/theme"))
        .query(&[("defaultValue", "dark")])
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "");
}

#[tokio::test]
async fn stats_push_updates_known_accounts() {
    let app = TestApp::spawn().await;
    let stats = AccountStatsList {
        data: vec![AccountStats::new("users", 12.0), AccountStats::new("invoices", 340.0)],
    };

    let body = app
        .client
        .post(app.url(&format!("/api/saas/account/{}/stats", ACME_UUID)))
        .json(&stats)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "DONE: Account stats updated");

    let acme = app.repository.find_by_id(1).await.unwrap().unwrap();
    assert_eq!(acme.stats.len(), 2);
    assert_eq!(acme.stats[0].value, 12.0);
}

#[tokio::test]
async fn stats_push_for_unknown_uuid_is_reported() {
    let app = TestApp::spawn().await;

    let body = app
        .client
        .post(app.url("/api/saas/account/ghost/stats"))
        .json(&AccountStatsList::default())
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(body, "Cannot found account with uuid: ghost");
}

#[tokio::test]
async fn current_account_needs_a_tenant() {
    let app = TestApp::spawn().await;

    let response = app.client.get(app.url("/api/saas/current")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    let response = app
        .client
        .get(app.url("/api/saas/current"))
        .header("x-account-id", "1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn gateway_account_header_selects_the_tenant() {
    let app = TestApp::spawn_behind_gateway().await;

    let dto: AccountDto = app
        .client
        .get(app.url("/api/saas/current"))
        .header("x-account-id", "1")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(dto.id, Some(1));
}

fn router() -> axum::Router {
    router_with(test_config())
}

fn gateway_router() -> axum::Router {
    router_with(test_config_with(&[("TRUSTED_GATEWAY", "true")]))
}

fn router_with(config: AccountServiceConfig) -> axum::Router {
    let repository = Arc::new(InMemoryAccountRepository::with_accounts(seed_accounts()));
    build_router(AppState::new(config, repository, None))
}

fn select(account_id: i64, principal: Option<i64>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/api/saas/current/{}", account_id));
    if let Some(principal) = principal {
        builder = builder.header(PRINCIPAL_ACCOUNT_HEADER, principal.to_string());
    }
    builder.body(Body::empty()).unwrap()
}

async fn read_dto(response: axum::response::Response) -> AccountDto {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn subdomain_in_host_resolves_tenant() {
    let response = router()
        .oneshot(
            Request::builder()
                .uri("/api/saas/current")
                .header(header::HOST, "licensed.saas.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_dto(response).await.id, Some(2));
}

#[tokio::test]
async fn account_header_is_ignored_without_gateway() {
    let response = router()
        .oneshot(
            Request::builder()
                .uri("/api/saas/current")
                .header(header::HOST, "acme.saas.example.com")
                .header("x-account-id", "2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_dto(response).await.id, Some(1));
}

#[tokio::test]
async fn anonymous_account_switch_is_rejected() {
    let response = router().oneshot(select(2, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn principal_header_needs_a_trusted_gateway() {
    let response = router().oneshot(select(2, Some(2))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn switching_to_a_foreign_account_is_forbidden() {
    let response = gateway_router().oneshot(select(2, Some(1))).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn selected_account_sticks_to_the_session() {
    let router = gateway_router();

    let selected = router.clone().oneshot(select(3, Some(3))).await.unwrap();
    assert_eq!(selected.status(), StatusCode::OK);
    let cookie = selected
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
        .expect("session cookie");
    assert_eq!(read_dto(selected).await.id, Some(3));

    let current = router
        .oneshot(
            Request::builder()
                .uri("/api/saas/current")
                .header(header::HOST, "acme.saas.example.com")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(current.status(), StatusCode::OK);
    assert_eq!(read_dto(current).await.id, Some(3));
}

#[tokio::test]
async fn selecting_unknown_account_is_not_found() {
    let response = gateway_router().oneshot(select(404, Some(404))).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
