use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::context::AccountContext;
use super::repository::AccountRepository;
use super::resolver::{normalize_host, RequestContext};
use super::session_holder::SessionScope;
use super::AccountError;
use crate::models::{AccountDto, AccountLog, AccountParameter, AccountStatus};

/// Ambient context of the caller, when it has one.
///
/// Background jobs pass [`CallerContext::none`]; web handlers pass the
/// request and its session.
#[derive(Clone, Copy, Default)]
pub struct CallerContext<'a> {
    pub request: Option<&'a RequestContext>,
    pub session: Option<&'a dyn SessionScope>,
}

impl<'a> CallerContext<'a> {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(request: &'a RequestContext, session: &'a dyn SessionScope) -> Self {
        Self {
            request: Some(request),
            session: Some(session),
        }
    }

    pub fn request_only(request: &'a RequestContext) -> Self {
        Self {
            request: Some(request),
            session: None,
        }
    }
}

/// Account operations shared by the local (database backed) service and
/// the clients talking to a remote admin server.
#[async_trait]
pub trait AccountServiceApi: Send + Sync {
    async fn account_status(&self, account_id: i64) -> Result<AccountStatus, AccountError>;

    async fn account(&self, account_id: i64) -> Result<Option<AccountDto>, AccountError>;

    async fn system_account_id(&self) -> Result<Option<i64>, AccountError>;

    async fn current_account_id(
        &self,
        caller: CallerContext<'_>,
    ) -> Result<Option<i64>, AccountError>;

    async fn current_account(
        &self,
        caller: CallerContext<'_>,
    ) -> Result<Option<AccountDto>, AccountError>;

    async fn set_current_account(
        &self,
        caller: CallerContext<'_>,
        account_id: i64,
    ) -> Result<Option<AccountDto>, AccountError>;

    async fn account_id_by_domain(&self, domain: &str) -> Result<Option<i64>, AccountError>;

    async fn update_account_users(
        &self,
        account_id: i64,
        users: u64,
        active_users: u64,
    ) -> Result<(), AccountError>;

    async fn find_accounts_id_by_feature(&self, feature: &str) -> Result<Vec<i64>, AccountError>;

    async fn log(&self, account_id: i64, message: &str) -> Result<(), AccountError> {
        tracing::info!(account_id, message, "Account log");
        Ok(())
    }

    async fn logs(
        &self,
        _account_id: i64,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<AccountLog>, AccountError> {
        Ok(Vec::new())
    }

    /// Parameter of the caller's current account, or `default` when the
    /// caller has no tenant or the parameter has no value.
    async fn parameter_value(
        &self,
        _caller: CallerContext<'_>,
        _name: &str,
        default: Option<&str>,
    ) -> Result<Option<String>, AccountError> {
        Ok(default.map(str::to_string))
    }

    async fn set_parameter(
        &self,
        _caller: CallerContext<'_>,
        _name: &str,
        _value: &str,
    ) -> Result<(), AccountError> {
        Err(AccountError::Unsupported("set_parameter"))
    }

    async fn has_feature(&self, account_id: i64, feature: &str) -> Result<bool, AccountError> {
        Ok(self
            .account(account_id)
            .await?
            .map(|dto| dto.has_feature(feature))
            .unwrap_or(false))
    }

    /// Fails with [`AccountError::Inactive`] unless the account is active.
    async fn validate_account_status(&self, account_id: i64) -> Result<(), AccountError> {
        match self.account_status(account_id).await? {
            AccountStatus::Active => Ok(()),
            _ => Err(AccountError::Inactive(account_id)),
        }
    }

    /// Tenant id pinned by configuration, overriding whatever was resolved.
    fn fixed_account_id(&self) -> Option<i64> {
        None
    }
}

/// Account service backed by the local repository.
pub struct LocalAccountService {
    repository: Arc<dyn AccountRepository>,
    context: AccountContext,
}

impl LocalAccountService {
    pub fn new(context: AccountContext) -> Self {
        Self {
            repository: context.repository().clone(),
            context,
        }
    }
}

#[async_trait]
impl AccountServiceApi for LocalAccountService {
    async fn account_status(&self, account_id: i64) -> Result<AccountStatus, AccountError> {
        Ok(self
            .repository
            .find_by_id(account_id)
            .await?
            .map(|a| a.status())
            .unwrap_or(AccountStatus::Canceled))
    }

    async fn account(&self, account_id: i64) -> Result<Option<AccountDto>, AccountError> {
        Ok(self
            .repository
            .find_by_id(account_id)
            .await?
            .map(|a| a.to_dto()))
    }

    async fn system_account_id(&self) -> Result<Option<i64>, AccountError> {
        Ok(self.repository.find_system_account().await?.map(|a| a.id))
    }

    async fn current_account_id(
        &self,
        caller: CallerContext<'_>,
    ) -> Result<Option<i64>, AccountError> {
        if let Some(id) = caller.request.and_then(|r| r.current_account_id()) {
            return Ok(Some(id));
        }

        if let Some(session) = caller.session {
            if let Ok(Some(holder)) = session.load().await {
                if let Some(id) = holder.current_id() {
                    return Ok(Some(id));
                }
            }
        }

        let Some(request) = caller.request else {
            return Ok(None);
        };
        Ok(self
            .context
            .current_account_id(request, caller.session)
            .await)
    }

    async fn current_account(
        &self,
        caller: CallerContext<'_>,
    ) -> Result<Option<AccountDto>, AccountError> {
        let Some(request) = caller.request else {
            return Ok(None);
        };
        Ok(self.context.to_dto(request, caller.session).await)
    }

    async fn set_current_account(
        &self,
        caller: CallerContext<'_>,
        account_id: i64,
    ) -> Result<Option<AccountDto>, AccountError> {
        let session = caller.session.ok_or(AccountError::NotInWebScope)?;
        let account = self
            .repository
            .find_by_id(account_id)
            .await?
            .ok_or(AccountError::NotFound(account_id))?;

        let mut holder = session.load().await?.unwrap_or_default();
        if holder.current_id() != Some(account_id) {
            if !holder.set_current(&account, self.repository.as_ref()).await {
                return Err(AccountError::NotFound(account_id));
            }
            session.save(&holder).await?;
            tracing::info!(account_id, "Current account changed");
        }
        Ok(holder.to_dto().cloned())
    }

    async fn account_id_by_domain(&self, domain: &str) -> Result<Option<i64>, AccountError> {
        let Some(host) = normalize_host(domain) else {
            return Ok(None);
        };
        if let Some(account) = self.repository.find_by_custom_domain(&host).await? {
            return Ok(Some(account.id));
        }
        let Some((subdomain, _)) = host.split_once('.') else {
            return Ok(None);
        };
        Ok(self
            .repository
            .find_by_subdomain(subdomain)
            .await?
            .map(|a| a.id))
    }

    async fn update_account_users(
        &self,
        account_id: i64,
        users: u64,
        active_users: u64,
    ) -> Result<(), AccountError> {
        self.repository
            .update_users(account_id, users, active_users)
            .await
    }

    async fn find_accounts_id_by_feature(&self, feature: &str) -> Result<Vec<i64>, AccountError> {
        self.repository.find_ids_by_feature(feature).await
    }

    async fn log(&self, account_id: i64, message: &str) -> Result<(), AccountError> {
        tracing::info!(account_id, message, "Account log");
        self.repository
            .add_log(AccountLog::new(account_id, message))
            .await
    }

    async fn logs(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AccountLog>, AccountError> {
        self.repository.find_logs(account_id, from, to).await
    }

    async fn parameter_value(
        &self,
        caller: CallerContext<'_>,
        name: &str,
        default: Option<&str>,
    ) -> Result<Option<String>, AccountError> {
        let Some(account_id) = self.current_account_id(caller).await? else {
            return Ok(default.map(str::to_string));
        };
        let stored = self
            .repository
            .find_parameter(account_id, name)
            .await?
            .and_then(|p| p.value);
        Ok(stored.or_else(|| default.map(str::to_string)))
    }

    async fn set_parameter(
        &self,
        caller: CallerContext<'_>,
        name: &str,
        value: &str,
    ) -> Result<(), AccountError> {
        let account_id = self
            .current_account_id(caller)
            .await?
            .ok_or(AccountError::NoCurrentAccount)?;
        self.repository
            .save_parameter(AccountParameter::new(account_id, name, value))
            .await
    }
}
