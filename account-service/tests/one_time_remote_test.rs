use account_service::models::{AccountDto, AccountStatus};
use account_service::services::remote::{
    FilePreferenceStore, MemoryPreferenceStore, OfflineCache, PreferenceStore,
};
use account_service::services::{RemoteAccountClient, RemoteAccountConfig};
use chrono::{Months, Utc};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UUID: &str = "one-time-uuid";
const HARDWARE: &str = "hw-one-time";

fn config(server: &MockServer) -> RemoteAccountConfig {
    let mut config = RemoteAccountConfig::new(server.uri(), UUID);
    config.hardware_id = Some(HARDWARE.to_string());
    config.max_users = 3;
    config.request_timeout_secs = 2;
    config
}

async fn mount_account(server: &MockServer, status: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/api/saas/account/{}", UUID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 11,
            "uuid": UUID,
            "name": "On-prem Co",
            "status": status,
            "maxUsers": 50
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn active_answer_is_persisted_and_reused_offline() {
    let server = MockServer::start().await;
    mount_account(&server, "ACTIVE", 1).await;
    let dir = TempDir::new().unwrap();
    let prefs = dir.path().join("preferences.json");

    let first = RemoteAccountClient::one_time(
        config(&server),
        Arc::new(FilePreferenceStore::open(&prefs).unwrap()),
    )
    .unwrap();
    assert!(first.is_one_time());
    let online = first.check_account_info().await.unwrap().unwrap();
    assert_eq!(online.status, AccountStatus::Active);
    assert_eq!(online.max_users, Some(50));

    // Checked once per process.
    first.check_account_info().await.unwrap();

    // A fresh process reads the offline copy without calling the server.
    let second = RemoteAccountClient::one_time(
        config(&server),
        Arc::new(FilePreferenceStore::open(&prefs).unwrap()),
    )
    .unwrap();
    let offline = second.check_account_info().await.unwrap().unwrap();
    assert_eq!(offline.id, Some(11));
    assert_eq!(offline.name.as_deref(), Some("On-prem Co"));
    assert_eq!(offline.max_users, Some(3));
}

#[tokio::test]
async fn offline_copy_is_keyed_by_hardware_and_uuid() {
    let server = MockServer::start().await;
    mount_account(&server, "ACTIVE", 1).await;
    let store = Arc::new(MemoryPreferenceStore::new());

    let client = RemoteAccountClient::one_time(config(&server), store.clone()).unwrap();
    client.check_account_info().await.unwrap();

    let cache = OfflineCache::new(store.clone(), HARDWARE, UUID, 6);
    let stored = cache.load(Utc::now()).expect("offline copy");
    assert_eq!(stored.id, Some(11));

    let other_machine = OfflineCache::new(store, "another-hw", UUID, 6);
    assert!(other_machine.load(Utc::now()).is_none());
}

#[tokio::test]
async fn expired_copy_forces_a_new_check() {
    let server = MockServer::start().await;
    mount_account(&server, "ACTIVE", 1).await;
    let store: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferenceStore::new());

    let stale = AccountDto {
        id: Some(11),
        name: Some("Stale Co".to_string()),
        status: AccountStatus::Active,
        ..Default::default()
    };
    let seven_months_ago = Utc::now()
        .checked_sub_months(Months::new(7))
        .unwrap();
    OfflineCache::new(store.clone(), HARDWARE, UUID, 6)
        .store(&stale, seven_months_ago)
        .unwrap();

    let client = RemoteAccountClient::one_time(config(&server), store).unwrap();
    let dto = client.check_account_info().await.unwrap().unwrap();

    assert_eq!(dto.name.as_deref(), Some("On-prem Co"));
}

#[tokio::test]
async fn inactive_answer_yields_invalid_license() {
    let server = MockServer::start().await;
    mount_account(&server, "SUSPENDED", 1).await;
    let store = Arc::new(MemoryPreferenceStore::new());

    let client = RemoteAccountClient::one_time(config(&server), store.clone()).unwrap();
    let dto = client.check_account_info().await.unwrap().unwrap();

    assert_eq!(dto.status, AccountStatus::New);
    assert_eq!(dto.status_description.as_deref(), Some("invalid license"));
    assert!(OfflineCache::new(store, HARDWARE, UUID, 6)
        .load(Utc::now())
        .is_none());
}

#[tokio::test]
async fn unreachable_server_yields_invalid_license() {
    let mut config = RemoteAccountConfig::new("http://127.0.0.1:9", UUID);
    config.hardware_id = Some(HARDWARE.to_string());
    config.request_timeout_secs = 1;

    let client =
        RemoteAccountClient::one_time(config, Arc::new(MemoryPreferenceStore::new())).unwrap();
    let dto = client.check_account_info().await.unwrap().unwrap();

    assert_eq!(dto.status, AccountStatus::New);
    assert_eq!(client.snapshot().await.fail_count, 1);
}
