mod common;

use account_service::models::{AccountDto, AccountStats, AccountStatus};
use account_service::services::remote::AccountStatsProvider;
use account_service::services::{
    AccountError, AccountRepository, AccountServiceApi, Clock, ManualClock,
    RemoteAccountClient, RemoteAccountConfig,
};
use async_trait::async_trait;
use chrono::Duration;
use common::{TestApp, ACME_UUID};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UUID: &str = "installation-uuid";

fn config(server: &MockServer) -> RemoteAccountConfig {
    let mut config = RemoteAccountConfig::new(server.uri(), UUID);
    config.hardware_id = Some("test-hardware".to_string());
    config.request_timeout_secs = 2;
    config
}

fn active_body() -> serde_json::Value {
    json!({
        "id": 7,
        "uuid": UUID,
        "name": "Acme",
        "status": "ACTIVE",
        "maxUsers": 25
    })
}

async fn mount_success(server: &MockServer, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/api/saas/account/{}", UUID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(active_body()))
        .up_to_n_times(times)
        .mount(server)
        .await;
}

async fn mount_failure(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/api/saas/account/{}", UUID)))
        .respond_with(ResponseTemplate::new(503))
        .mount(server)
        .await;
}

fn client(server: &MockServer, clock: Arc<ManualClock>) -> RemoteAccountClient {
    RemoteAccountClient::new(config(server))
        .unwrap()
        .with_clock(clock)
}

fn past_ttl() -> Duration {
    Duration::seconds(3601)
}

#[tokio::test]
async fn successful_sync_resets_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/saas/account/{}", UUID)))
        .and(query_param("uuid", "test-hardware"))
        .respond_with(ResponseTemplate::new(200).set_body_json(active_body()))
        .expect(1)
        .mount(&server)
        .await;
    let clock = Arc::new(ManualClock::default());
    let client = client(&server, clock.clone());

    let dto = client.check_account_info().await.unwrap().unwrap();
    assert_eq!(dto.id, Some(7));
    assert_eq!(dto.status, AccountStatus::Active);

    let snapshot = client.snapshot().await;
    assert_eq!(snapshot.fail_count, 0);
    assert_eq!(snapshot.last_sync, Some(clock.now()));

    // Within the TTL the cached snapshot is served.
    clock.advance(Duration::minutes(30));
    client.check_account_info().await.unwrap();
}

#[tokio::test]
async fn diagnostics_are_sent_when_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/saas/account/{}", UUID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(active_body()))
        .expect(1)
        .mount(&server)
        .await;
    let client = client(&server, Arc::new(ManualClock::default()));

    client.check_account_info().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert!(query.contains("info="), "query was {query}");
    assert!(query.contains("uuid=test-hardware"));
}

#[tokio::test]
async fn default_id_overrides_remote_id() {
    let server = MockServer::start().await;
    mount_success(&server, 1).await;
    let mut config = config(&server);
    config.default_id = Some(1);
    let client = RemoteAccountClient::new(config).unwrap();

    let dto = client.check_account_info().await.unwrap().unwrap();
    assert_eq!(dto.id, Some(1));
    assert_eq!(client.fixed_account_id(), Some(1));
}

#[tokio::test]
async fn up_to_five_failures_keep_last_good_account() {
    let server = MockServer::start().await;
    mount_success(&server, 1).await;
    mount_failure(&server).await;
    let clock = Arc::new(ManualClock::default());
    let client = client(&server, clock.clone());

    client.check_account_info().await.unwrap();

    for attempt in 1..=5 {
        clock.advance(past_ttl());
        let dto = client.check_account_info().await.unwrap().unwrap();
        assert_eq!(dto.status, AccountStatus::Active, "attempt {attempt}");
        assert_eq!(dto.id, Some(7));
        assert_eq!(client.snapshot().await.fail_count, attempt);
    }
}

#[tokio::test]
async fn failure_without_history_serves_temporary_account() {
    let server = MockServer::start().await;
    mount_failure(&server).await;
    let client = client(&server, Arc::new(ManualClock::default()));

    let dto = client.check_account_info().await.unwrap().unwrap();

    assert_eq!(dto.status, AccountStatus::Active);
    assert_eq!(dto.name.as_deref(), Some("Temporary Account"));
    assert_eq!(dto.identification.as_deref(), Some("0000"));
    assert!(dto.remote);
}

#[tokio::test]
async fn sixth_failure_cancels_and_tenth_is_fatal() {
    let server = MockServer::start().await;
    mount_success(&server, 1).await;
    mount_failure(&server).await;
    let clock = Arc::new(ManualClock::default());
    let client = client(&server, clock.clone());

    client.check_account_info().await.unwrap();
    for _ in 1..=5 {
        clock.advance(past_ttl());
        client.check_account_info().await.unwrap();
    }

    clock.advance(past_ttl());
    let sixth = client.check_account_info().await.unwrap().unwrap();
    assert_eq!(sixth.status, AccountStatus::Canceled);
    assert!(!client.is_blocked().await);
    assert_eq!(
        client.account_status(7).await.unwrap(),
        AccountStatus::Canceled
    );

    // A canceled snapshot is re-checked on every call.
    let mut last = None;
    while client.snapshot().await.fail_count < 10 {
        last = Some(client.check_account_info().await);
    }
    let err = last.expect("at least one retry").unwrap_err();
    assert!(matches!(err, AccountError::RemoteNotAuthenticated(_)));
    assert_eq!(client.snapshot().await.fail_count, 10);
    assert!(client.is_blocked().await);
}

#[tokio::test]
async fn recovery_after_failures_resets_counter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/saas/account/{}", UUID)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    mount_success(&server, 1).await;
    let clock = Arc::new(ManualClock::default());
    let client = client(&server, clock.clone());

    for _ in 0..3 {
        client.check_account_info().await.unwrap();
        clock.advance(past_ttl());
    }
    assert_eq!(client.snapshot().await.fail_count, 3);

    let dto = client.check_account_info().await.unwrap().unwrap();
    assert_eq!(dto.name.as_deref(), Some("Acme"));
    assert_eq!(client.snapshot().await.fail_count, 0);
}

struct FixedStats;

#[async_trait]
impl AccountStatsProvider for FixedStats {
    async fn account_stats(&self, account_id: i64) -> Vec<AccountStats> {
        let mut users = AccountStats::new("users", 4.0);
        users.description = Some(format!("account {account_id}"));
        vec![users]
    }
}

#[tokio::test]
async fn stats_are_posted_after_first_sync() {
    let server = MockServer::start().await;
    mount_success(&server, 1).await;
    Mock::given(method("POST"))
        .and(path(format!("/api/saas/account/{}/stats", UUID)))
        .respond_with(ResponseTemplate::new(200).set_body_string("DONE: Account stats updated"))
        .expect(1)
        .mount(&server)
        .await;
    let client = client(&server, Arc::new(ManualClock::default()))
        .with_stats_provider(Arc::new(FixedStats));

    assert_eq!(client.send_stats().await.unwrap(), None);

    client.check_account_info().await.unwrap();
    let response = client.send_stats().await.unwrap();
    assert_eq!(response.as_deref(), Some("DONE: Account stats updated"));

    let requests = server.received_requests().await.unwrap();
    let posted: serde_json::Value = requests
        .iter()
        .find(|r| r.method.to_string() == "POST")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .unwrap();
    assert_eq!(posted["data"][0]["name"], "users");
    assert_eq!(posted["data"][0]["description"], "account 7");
}

#[tokio::test]
async fn remote_client_talks_to_account_service() {
    let app = TestApp::spawn().await;
    let mut config = RemoteAccountConfig::new(app.address.clone(), ACME_UUID);
    config.hardware_id = Some("hw".to_string());
    let client = RemoteAccountClient::new(config)
        .unwrap()
        .with_stats_provider(Arc::new(FixedStats));

    let dto: AccountDto = client.check_account_info().await.unwrap().unwrap();
    assert_eq!(dto.id, Some(1));
    assert_eq!(dto.status, AccountStatus::Active);

    let response = client.send_stats().await.unwrap();
    assert_eq!(response.as_deref(), Some("DONE: Account stats updated"));
    let acme = app.repository.find_by_id(1).await.unwrap().unwrap();
    assert_eq!(acme.stats[0].name, "users");
}
