use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::endpoint::RemoteEndpoint;
use super::one_time::OfflineCache;
use super::stats::AccountStatsProvider;
use super::RemoteAccountConfig;
use crate::models::{AccountDto, AccountStatsList, AccountStatus};
use crate::services::api::{AccountServiceApi, CallerContext};
use crate::services::clock::{Clock, SystemClock};
use crate::services::metrics::{record_remote_sync, record_stats_push};
use crate::services::AccountError;

pub(super) const REMOTE_CONNECTION_FAILED: &str = "remote connection failed";

const FALLBACK_ACCOUNT_ID: i64 = 1;

#[derive(Debug, Default)]
pub(super) struct SyncState {
    pub(super) account: Option<AccountDto>,
    pub(super) last_sync: Option<DateTime<Utc>>,
    pub(super) fail_count: u32,
    pub(super) last_good: Option<AccountDto>,
}

/// Point-in-time copy of the client's sync state.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot {
    pub account: Option<AccountDto>,
    pub last_sync: Option<DateTime<Utc>>,
    pub fail_count: u32,
}

pub(super) enum SyncMode {
    /// Re-check every `sync_ttl`, degrading after repeated failures.
    Periodic,
    /// Check once per process, falling back to an offline copy.
    OneTime(OfflineCache),
}

/// Account service answering from the admin server's view of this
/// installation's account.
pub struct RemoteAccountClient {
    pub(super) endpoint: RemoteEndpoint,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) state: Mutex<SyncState>,
    pub(super) mode: SyncMode,
    stats_providers: Vec<Arc<dyn AccountStatsProvider>>,
}

impl RemoteAccountClient {
    pub fn new(config: RemoteAccountConfig) -> Result<Self, AccountError> {
        Self::with_mode(config, SyncMode::Periodic, Arc::new(SystemClock))
    }

    pub(super) fn with_mode(
        config: RemoteAccountConfig,
        mode: SyncMode,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AccountError> {
        Ok(Self {
            endpoint: RemoteEndpoint::new(config)?,
            clock,
            state: Mutex::new(SyncState::default()),
            mode,
            stats_providers: Vec::new(),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_stats_provider(mut self, provider: Arc<dyn AccountStatsProvider>) -> Self {
        self.stats_providers.push(provider);
        self
    }

    pub fn config(&self) -> &RemoteAccountConfig {
        self.endpoint.config()
    }

    pub fn endpoint(&self) -> &RemoteEndpoint {
        &self.endpoint
    }

    pub async fn snapshot(&self) -> SyncSnapshot {
        let state = self.state.lock().await;
        SyncSnapshot {
            account: state.account.clone(),
            last_sync: state.last_sync,
            fail_count: state.fail_count,
        }
    }

    /// True once failures reached `fail_after`; account checks are then
    /// refused until the server answers again.
    pub async fn is_blocked(&self) -> bool {
        self.state.lock().await.fail_count >= self.config().fail_after
    }

    fn needs_sync(&self, state: &SyncState) -> bool {
        let Some(account) = &state.account else {
            return true;
        };
        if matches!(self.mode, SyncMode::OneTime(_)) {
            return false;
        }
        if account.status == AccountStatus::Canceled {
            return true;
        }
        match state.last_sync {
            Some(last) => self.clock.now() - last >= self.config().sync_ttl(),
            None => true,
        }
    }

    /// Cached snapshot, re-synchronized when stale.
    ///
    /// Fails with [`AccountError::RemoteNotAuthenticated`] once the server
    /// has been unreachable `fail_after` times in a row.
    pub async fn check_account_info(&self) -> Result<Option<AccountDto>, AccountError> {
        let mut state = self.state.lock().await;
        if self.needs_sync(&state) {
            match &self.mode {
                SyncMode::Periodic => self.sync_account_info(&mut state).await?,
                SyncMode::OneTime(cache) => self.sync_one_time(cache, &mut state).await,
            }
        }
        Ok(state.account.clone())
    }

    pub(super) fn apply_default_id(&self, dto: &mut AccountDto) {
        if let Some(id) = self.config().default_id {
            dto.id = Some(id);
        }
    }

    async fn sync_account_info(&self, state: &mut SyncState) -> Result<(), AccountError> {
        let now = self.clock.now();
        match self.endpoint.fetch_account(true).await {
            Ok(mut dto) => {
                self.apply_default_id(&mut dto);
                tracing::info!(
                    account_id = ?dto.id,
                    status = %dto.status,
                    "Remote account synchronized"
                );
                state.fail_count = 0;
                state.last_sync = Some(now);
                state.account = Some(dto.clone());
                state.last_good = Some(dto);
                record_remote_sync("success", 0);
                Ok(())
            }
            Err(e) => {
                state.fail_count += 1;
                let config = self.config();

                if state.fail_count >= config.fail_after {
                    let mut placeholder = AccountDto::temporary(config.default_id);
                    placeholder.status = AccountStatus::Canceled;
                    placeholder.status_description = Some(REMOTE_CONNECTION_FAILED.to_string());
                    state.account = Some(placeholder);
                    record_remote_sync("fatal", state.fail_count);
                    tracing::error!(
                        error = %e,
                        fail_count = state.fail_count,
                        "Remote account server unreachable, refusing to serve account"
                    );
                    return Err(AccountError::RemoteNotAuthenticated(
                        REMOTE_CONNECTION_FAILED.to_string(),
                    ));
                }

                let served = if state.fail_count > config.degrade_after {
                    let mut placeholder = AccountDto::temporary(config.default_id);
                    placeholder.status = AccountStatus::Canceled;
                    placeholder.status_description = Some(REMOTE_CONNECTION_FAILED.to_string());
                    record_remote_sync("degraded", state.fail_count);
                    placeholder
                } else {
                    record_remote_sync("fail_open", state.fail_count);
                    state
                        .last_good
                        .clone()
                        .unwrap_or_else(|| AccountDto::temporary(config.default_id))
                };

                tracing::warn!(
                    error = %e,
                    fail_count = state.fail_count,
                    status = %served.status,
                    "Remote account sync failed"
                );
                state.account = Some(served);
                state.last_sync = Some(now);
                Ok(())
            }
        }
    }

    async fn cached_id(&self) -> Result<i64, AccountError> {
        if let Some(id) = self.config().default_id {
            return Ok(id);
        }
        Ok(self
            .check_account_info()
            .await?
            .and_then(|dto| dto.id)
            .unwrap_or(FALLBACK_ACCOUNT_ID))
    }

    /// Push stats from every registered provider to the admin server.
    ///
    /// Does nothing until an account has been loaded.
    pub async fn send_stats(&self) -> Result<Option<String>, AccountError> {
        let account_id = {
            let state = self.state.lock().await;
            match &state.account {
                Some(dto) => dto.id.unwrap_or(FALLBACK_ACCOUNT_ID),
                None => return Ok(None),
            }
        };

        let mut stats = AccountStatsList::default();
        for provider in &self.stats_providers {
            stats.extend(provider.account_stats(account_id).await);
        }

        match self.endpoint.post_stats(&stats).await {
            Ok(response) => {
                record_stats_push("ok");
                tracing::info!(
                    account_id,
                    count = stats.data.len(),
                    response = %response,
                    "Stats response"
                );
                Ok(Some(response))
            }
            Err(e) => {
                record_stats_push("error");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl AccountServiceApi for RemoteAccountClient {
    async fn account_status(&self, _account_id: i64) -> Result<AccountStatus, AccountError> {
        Ok(self
            .check_account_info()
            .await?
            .map(|dto| dto.status)
            .unwrap_or(AccountStatus::Canceled))
    }

    async fn account(&self, _account_id: i64) -> Result<Option<AccountDto>, AccountError> {
        self.check_account_info().await
    }

    async fn system_account_id(&self) -> Result<Option<i64>, AccountError> {
        Ok(Some(self.cached_id().await?))
    }

    async fn current_account_id(
        &self,
        _caller: CallerContext<'_>,
    ) -> Result<Option<i64>, AccountError> {
        Ok(Some(self.cached_id().await?))
    }

    async fn current_account(
        &self,
        _caller: CallerContext<'_>,
    ) -> Result<Option<AccountDto>, AccountError> {
        self.check_account_info().await
    }

    async fn set_current_account(
        &self,
        _caller: CallerContext<'_>,
        _account_id: i64,
    ) -> Result<Option<AccountDto>, AccountError> {
        Err(AccountError::Unsupported(
            "remote accounts cannot change the current account",
        ))
    }

    async fn account_id_by_domain(&self, _domain: &str) -> Result<Option<i64>, AccountError> {
        Ok(Some(self.cached_id().await?))
    }

    async fn update_account_users(
        &self,
        account_id: i64,
        users: u64,
        active_users: u64,
    ) -> Result<(), AccountError> {
        tracing::debug!(account_id, users, active_users, "User counts are not reported remotely");
        Ok(())
    }

    async fn find_accounts_id_by_feature(&self, _feature: &str) -> Result<Vec<i64>, AccountError> {
        Ok(Vec::new())
    }

    fn fixed_account_id(&self) -> Option<i64> {
        self.config().default_id
    }
}
