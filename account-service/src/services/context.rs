use std::sync::Arc;

use super::repository::AccountRepository;
use super::resolver::{RequestContext, ResolverRegistry};
use super::session_holder::{AccountSessionHolder, SessionScope};
use super::status_cache::AccountStatusCache;
use crate::models::{Account, AccountDto};

/// Single entry point for "which tenant is this request for".
///
/// Session-cached accounts are preferred; the resolver chain only runs on a
/// miss, and its result is written back to the session when there is one.
#[derive(Clone)]
pub struct AccountContext {
    resolvers: ResolverRegistry,
    repository: Arc<dyn AccountRepository>,
    status_cache: Arc<AccountStatusCache>,
}

impl AccountContext {
    pub fn new(
        resolvers: ResolverRegistry,
        repository: Arc<dyn AccountRepository>,
        status_cache: Arc<AccountStatusCache>,
    ) -> Self {
        Self {
            resolvers,
            repository,
            status_cache,
        }
    }

    pub fn repository(&self) -> &Arc<dyn AccountRepository> {
        &self.repository
    }

    pub fn status_cache(&self) -> &Arc<AccountStatusCache> {
        &self.status_cache
    }

    pub fn resolvers(&self) -> &ResolverRegistry {
        &self.resolvers
    }

    async fn load_holder(&self, scope: &dyn SessionScope) -> Option<AccountSessionHolder> {
        match scope.load().await {
            Ok(holder) => holder,
            Err(e) => {
                tracing::debug!(error = %e, "Session holder unavailable");
                None
            }
        }
    }

    async fn save_holder(&self, scope: &dyn SessionScope, holder: &AccountSessionHolder) {
        if let Err(e) = scope.save(holder).await {
            tracing::warn!(error = %e, "Cannot store session holder");
        }
    }

    async fn resolve_with_holder(
        &self,
        ctx: &RequestContext,
        scope: Option<&dyn SessionScope>,
    ) -> Option<(Account, Option<AccountSessionHolder>)> {
        let mut holder = match scope {
            Some(scope) => self.load_holder(scope).await,
            None => None,
        };

        if let (Some(scope), Some(mut h)) = (scope, holder.take()) {
            if let Some(account) = h.current(self.repository.as_ref()).await {
                if !self.status_cache.is_status_changed(Some(account.id)) {
                    return Some((account, Some(h)));
                }
                tracing::info!(
                    account_id = account.id,
                    "Refreshing session account after status change"
                );
                if h.set_current(&account, self.repository.as_ref()).await {
                    self.save_holder(scope, &h).await;
                }
                let refreshed = h.current(self.repository.as_ref()).await.unwrap_or(account);
                return Some((refreshed, Some(h)));
            }
            holder = Some(h);
        }

        let account = self.resolvers.resolve(ctx).await?;

        let Some(scope) = scope else {
            return Some((account, None));
        };

        let mut h = holder.unwrap_or_default();
        if !h.set_current(&account, self.repository.as_ref()).await {
            return Some((account, Some(h)));
        }
        self.save_holder(scope, &h).await;
        let cached = h.current(self.repository.as_ref()).await.unwrap_or(account);
        Some((cached, Some(h)))
    }

    /// Current tenant, or `None` when the request has no tenant context.
    pub async fn get_account(
        &self,
        ctx: &RequestContext,
        scope: Option<&dyn SessionScope>,
    ) -> Option<Account> {
        self.resolve_with_holder(ctx, scope).await.map(|(a, _)| a)
    }

    /// Session snapshot when cached, else the freshly resolved projection.
    pub async fn to_dto(
        &self,
        ctx: &RequestContext,
        scope: Option<&dyn SessionScope>,
    ) -> Option<AccountDto> {
        let (account, holder) = self.resolve_with_holder(ctx, scope).await?;
        match holder.and_then(|h| h.to_dto().cloned()) {
            Some(dto) => Some(dto),
            None => Some(account.to_dto()),
        }
    }

    pub async fn is_admin_account(
        &self,
        ctx: &RequestContext,
        scope: Option<&dyn SessionScope>,
    ) -> bool {
        self.get_account(ctx, scope)
            .await
            .map(|a| a.is_admin())
            .unwrap_or(false)
    }

    pub async fn current_account_id(
        &self,
        ctx: &RequestContext,
        scope: Option<&dyn SessionScope>,
    ) -> Option<i64> {
        self.get_account(ctx, scope).await.map(|a| a.id)
    }

    /// Locale of the session's account, or the process default.
    pub async fn account_locale(&self, scope: &dyn SessionScope) -> String {
        self.load_holder(scope).await.unwrap_or_default().account_locale()
    }

    pub async fn account_time_zone(&self, scope: &dyn SessionScope) -> chrono_tz::Tz {
        self.load_holder(scope).await.unwrap_or_default().account_time_zone()
    }
}
