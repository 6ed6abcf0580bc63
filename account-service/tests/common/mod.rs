#![allow(dead_code)]

use account_service::config::AccountServiceConfig;
use account_service::models::{Account, AccountStatus};
use account_service::services::{AccountRepository, InMemoryAccountRepository};
use account_service::startup::Application;
use service_core::config::Config as CoreConfig;
use std::sync::Arc;

pub const ACME_UUID: &str = "acme-uuid";
pub const LICENSED_UUID: &str = "licensed-uuid";
pub const LICENSED_INSTANCE: &str = "hw-licensed";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
    pub repository: Arc<InMemoryAccountRepository>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(seed_accounts()).await
    }

    pub async fn spawn_with(accounts: Vec<Account>) -> Self {
        Self::spawn_with_config(test_config(), accounts).await
    }

    /// Spawn behind a trusted gateway: account and principal headers count.
    pub async fn spawn_behind_gateway() -> Self {
        Self::spawn_with_config(test_config_with(&[("TRUSTED_GATEWAY", "true")]), seed_accounts())
            .await
    }

    pub async fn spawn_with_config(config: AccountServiceConfig, accounts: Vec<Account>) -> Self {
        let repository = Arc::new(InMemoryAccountRepository::with_accounts(accounts));
        let shared: Arc<dyn AccountRepository> = repository.clone();

        let app = Application::build_with(config, shared, None)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            client,
            repository,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

/// Local configuration with a random port and no remote checks.
pub fn test_config() -> AccountServiceConfig {
    test_config_with(&[])
}

/// Test configuration with the given variables set.
pub fn test_config_with(vars: &[(&str, &str)]) -> AccountServiceConfig {
    let common = CoreConfig {
        port: 0,
        ..Default::default()
    };
    AccountServiceConfig::from_lookup(common, |key| {
        vars.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    })
    .expect("Failed to build test config")
}

pub fn seed_accounts() -> Vec<Account> {
    let acme = Account::new(1, ACME_UUID, "Acme")
        .with_status(AccountStatus::Active)
        .with_subdomain("acme");

    let mut licensed = Account::new(2, LICENSED_UUID, "Licensed")
        .with_status(AccountStatus::Active)
        .with_subdomain("licensed");
    licensed.instance_uuid = Some(LICENSED_INSTANCE.to_string());
    licensed.required_instance_uuid = true;

    let system = Account::new(3, "system-uuid", "System").with_status(AccountStatus::Active);

    vec![acme, licensed, system]
}
