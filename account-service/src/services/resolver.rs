use async_trait::async_trait;
use http::HeaderMap;
use std::collections::HashMap;
use std::sync::Arc;

use super::api::AccountServiceApi;
use super::repository::AccountRepository;
use crate::models::Account;

/// Request attribute carrying an explicitly selected account id.
pub const CURRENT_ACCOUNT_ID_ATTRIBUTE: &str = "currentAccountId";

pub const DEFAULT_ACCOUNT_HEADER: &str = "x-account-id";

/// Everything a resolver may inspect about the in-flight request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub host: Option<String>,
    pub headers: HeaderMap,
    pub attributes: HashMap<String, String>,
    pub principal_account_id: Option<i64>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_principal_account_id(mut self, id: i64) -> Self {
        self.principal_account_id = Some(id);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// `currentAccountId` attribute, when present and numeric.
    pub fn current_account_id(&self) -> Option<i64> {
        self.attribute(CURRENT_ACCOUNT_ID_ATTRIBUTE)
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// One strategy for finding the tenant of a request.
///
/// Returning `None` means "not mine"; the next resolver is tried.
#[async_trait]
pub trait AccountResolver: Send + Sync {
    async fn resolve(&self, ctx: &RequestContext) -> Option<Account>;

    fn name(&self) -> &str;
}

/// Ordered resolver chain. The first resolver producing an account wins.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: Vec<Arc<dyn AccountResolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resolver: Arc<dyn AccountResolver>) -> &mut Self {
        tracing::info!(resolver = resolver.name(), "Registered account resolver");
        self.resolvers.push(resolver);
        self
    }

    pub fn with(mut self, resolver: Arc<dyn AccountResolver>) -> Self {
        self.register(resolver);
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    pub async fn resolve(&self, ctx: &RequestContext) -> Option<Account> {
        for resolver in &self.resolvers {
            if let Some(account) = resolver.resolve(ctx).await {
                tracing::debug!(
                    resolver = resolver.name(),
                    account_id = account.id,
                    "Account resolved"
                );
                return Some(account);
            }
        }
        None
    }
}

async fn find_by_id(repository: &dyn AccountRepository, id: i64, source: &str) -> Option<Account> {
    match repository.find_by_id(id).await {
        Ok(account) => account,
        Err(e) => {
            tracing::warn!(error = %e, account_id = id, resolver = source, "Account lookup failed");
            None
        }
    }
}

/// Resolves from the `currentAccountId` request attribute.
pub struct RequestAttributeResolver {
    repository: Arc<dyn AccountRepository>,
}

impl RequestAttributeResolver {
    pub fn new(repository: Arc<dyn AccountRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl AccountResolver for RequestAttributeResolver {
    async fn resolve(&self, ctx: &RequestContext) -> Option<Account> {
        let id = ctx.current_account_id()?;
        find_by_id(self.repository.as_ref(), id, self.name()).await
    }

    fn name(&self) -> &str {
        "request-attribute"
    }
}

/// Resolves from an account id header set by a trusted gateway.
pub struct HeaderAccountResolver {
    repository: Arc<dyn AccountRepository>,
    header: String,
}

impl HeaderAccountResolver {
    pub fn new(repository: Arc<dyn AccountRepository>) -> Self {
        Self::with_header(repository, DEFAULT_ACCOUNT_HEADER)
    }

    pub fn with_header(repository: Arc<dyn AccountRepository>, header: impl Into<String>) -> Self {
        Self {
            repository,
            header: header.into().to_ascii_lowercase(),
        }
    }
}

#[async_trait]
impl AccountResolver for HeaderAccountResolver {
    async fn resolve(&self, ctx: &RequestContext) -> Option<Account> {
        let id: i64 = ctx.header(&self.header)?.trim().parse().ok()?;
        find_by_id(self.repository.as_ref(), id, self.name()).await
    }

    fn name(&self) -> &str {
        "header"
    }
}

/// Resolves from the request host: custom domain first, then subdomain.
pub struct DomainAccountResolver {
    repository: Arc<dyn AccountRepository>,
}

impl DomainAccountResolver {
    pub fn new(repository: Arc<dyn AccountRepository>) -> Self {
        Self { repository }
    }
}

/// Lower-cased host without port.
pub fn normalize_host(host: &str) -> Option<String> {
    let host = host.trim();
    let host = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

#[async_trait]
impl AccountResolver for DomainAccountResolver {
    async fn resolve(&self, ctx: &RequestContext) -> Option<Account> {
        let host = normalize_host(ctx.host.as_deref()?)?;

        match self.repository.find_by_custom_domain(&host).await {
            Ok(Some(account)) => return Some(account),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, host = %host, "Custom domain lookup failed"),
        }

        let (subdomain, _) = host.split_once('.')?;
        match self.repository.find_by_subdomain(subdomain).await {
            Ok(account) => account,
            Err(e) => {
                tracing::warn!(error = %e, subdomain, "Subdomain lookup failed");
                None
            }
        }
    }

    fn name(&self) -> &str {
        "domain"
    }
}

/// Resolves from the account bound to the authenticated principal.
pub struct PrincipalAccountResolver {
    repository: Arc<dyn AccountRepository>,
}

impl PrincipalAccountResolver {
    pub fn new(repository: Arc<dyn AccountRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl AccountResolver for PrincipalAccountResolver {
    async fn resolve(&self, ctx: &RequestContext) -> Option<Account> {
        let id = ctx.principal_account_id?;
        find_by_id(self.repository.as_ref(), id, self.name()).await
    }

    fn name(&self) -> &str {
        "principal"
    }
}

/// Adapts an [`AccountServiceApi`] backend (typically the remote admin
/// server) into the resolver chain.
pub struct RemoteAccountResolver {
    api: Arc<dyn AccountServiceApi>,
}

impl RemoteAccountResolver {
    pub fn new(api: Arc<dyn AccountServiceApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl AccountResolver for RemoteAccountResolver {
    async fn resolve(&self, _ctx: &RequestContext) -> Option<Account> {
        let id = match self.api.current_account_id(Default::default()).await {
            Ok(Some(id)) => id,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Remote account id unavailable");
                return None;
            }
        };

        match self.api.account(id).await {
            Ok(Some(dto)) => Account::from_dto(&dto),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, account_id = id, "Remote account unavailable");
                None
            }
        }
    }

    fn name(&self) -> &str {
        "remote"
    }
}
