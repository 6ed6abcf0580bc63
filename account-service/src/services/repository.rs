use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

use super::AccountError;
use crate::models::{Account, AccountDto, AccountLog, AccountParameter, AccountStats};

/// Persistence boundary for accounts.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, AccountError>;

    /// Consistent read used when caching an account into a session.
    async fn find_by_id_in_transaction(&self, id: i64) -> Result<Option<Account>, AccountError> {
        self.find_by_id(id).await
    }

    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<Account>, AccountError>;

    async fn find_by_custom_domain(&self, domain: &str) -> Result<Option<Account>, AccountError>;

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Account>, AccountError>;

    async fn find_system_account(&self) -> Result<Option<Account>, AccountError>;

    async fn find_ids_by_feature(&self, feature: &str) -> Result<Vec<i64>, AccountError>;

    async fn save(&self, account: Account) -> Result<(), AccountError>;

    async fn update_stats(&self, id: i64, stats: Vec<AccountStats>) -> Result<(), AccountError>;

    async fn update_users(&self, id: i64, users: u64, active_users: u64)
        -> Result<(), AccountError>;

    async fn find_parameter(
        &self,
        account_id: i64,
        name: &str,
    ) -> Result<Option<AccountParameter>, AccountError>;

    /// Insert or replace by `(account_id, name)`.
    async fn save_parameter(&self, parameter: AccountParameter) -> Result<(), AccountError>;

    async fn add_log(&self, log: AccountLog) -> Result<(), AccountError>;

    /// Logs of one account created within `[from, to]`, oldest first.
    async fn find_logs(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AccountLog>, AccountError>;
}

/// In-process repository backing dev mode and tests.
#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: RwLock<HashMap<i64, Account>>,
    parameters: RwLock<HashMap<(i64, String), AccountParameter>>,
    logs: RwLock<Vec<AccountLog>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        Self {
            accounts: RwLock::new(accounts.into_iter().map(|a| (a.id, a)).collect()),
            ..Default::default()
        }
    }

    /// Load accounts from a JSON array of account snapshots.
    pub fn from_seed_file(path: impl AsRef<Path>) -> Result<Self, AccountError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AccountError::Repository(format!("Cannot read {}: {e}", path.display())))?;
        let snapshots: Vec<AccountDto> = serde_json::from_str(&raw)?;

        let accounts: Vec<Account> = snapshots.iter().filter_map(Account::from_dto).collect();
        if accounts.len() != snapshots.len() {
            tracing::warn!(
                skipped = snapshots.len() - accounts.len(),
                "Seed entries without id were skipped"
            );
        }
        tracing::info!(count = accounts.len(), path = %path.display(), "Accounts seeded");
        Ok(Self::with_accounts(accounts))
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }

    async fn find_first<F>(&self, predicate: F) -> Option<Account>
    where
        F: Fn(&Account) -> bool,
    {
        self.accounts
            .read()
            .await
            .values()
            .find(|a| predicate(a))
            .cloned()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, AccountError> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<Account>, AccountError> {
        if uuid.is_empty() {
            return Ok(None);
        }
        Ok(self.find_first(|a| a.uuid == uuid).await)
    }

    async fn find_by_custom_domain(&self, domain: &str) -> Result<Option<Account>, AccountError> {
        Ok(self
            .find_first(|a| {
                a.custom_domain
                    .as_deref()
                    .is_some_and(|d| d.eq_ignore_ascii_case(domain))
            })
            .await)
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Account>, AccountError> {
        Ok(self
            .find_first(|a| {
                a.subdomain
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case(subdomain))
            })
            .await)
    }

    async fn find_system_account(&self) -> Result<Option<Account>, AccountError> {
        Ok(self.find_first(|a| a.name == "System").await)
    }

    async fn find_ids_by_feature(&self, feature: &str) -> Result<Vec<i64>, AccountError> {
        let mut ids: Vec<i64> = self
            .accounts
            .read()
            .await
            .values()
            .filter(|a| {
                a.features
                    .iter()
                    .any(|f| f.provider_id == feature && f.enabled)
            })
            .map(|a| a.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn save(&self, account: Account) -> Result<(), AccountError> {
        self.accounts.write().await.insert(account.id, account);
        Ok(())
    }

    async fn update_stats(&self, id: i64, stats: Vec<AccountStats>) -> Result<(), AccountError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(AccountError::NotFound(id))?;
        account.merge_stats(stats);
        Ok(())
    }

    async fn update_users(
        &self,
        id: i64,
        users: u64,
        active_users: u64,
    ) -> Result<(), AccountError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(AccountError::NotFound(id))?;
        account.users = users;
        account.active_users = active_users;
        Ok(())
    }

    async fn find_parameter(
        &self,
        account_id: i64,
        name: &str,
    ) -> Result<Option<AccountParameter>, AccountError> {
        Ok(self
            .parameters
            .read()
            .await
            .get(&(account_id, name.to_string()))
            .cloned())
    }

    async fn save_parameter(&self, parameter: AccountParameter) -> Result<(), AccountError> {
        self.parameters
            .write()
            .await
            .insert((parameter.account_id, parameter.name.clone()), parameter);
        Ok(())
    }

    async fn add_log(&self, log: AccountLog) -> Result<(), AccountError> {
        self.logs.write().await.push(log);
        Ok(())
    }

    async fn find_logs(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AccountLog>, AccountError> {
        let mut logs: Vec<AccountLog> = self
            .logs
            .read()
            .await
            .iter()
            .filter(|l| l.account_id == account_id)
            .filter(|l| l.creation_date >= from && l.creation_date <= to)
            .cloned()
            .collect();
        logs.sort_by_key(|l| l.creation_date);
        Ok(logs)
    }
}
