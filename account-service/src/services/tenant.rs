use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::api::{AccountServiceApi, CallerContext};
use super::AccountError;

pub const ACCOUNT_ID_PARAM: &str = "accountId";

/// Entities owned by a single tenant.
pub trait AccountAware {
    fn account_id(&self) -> Option<i64>;

    fn set_account_id(&mut self, account_id: i64);
}

/// Filter parameters of a query about to run.
#[derive(Debug, Clone, Default)]
pub struct QueryParameters {
    target_account_aware: bool,
    params: BTreeMap<String, Value>,
}

impl QueryParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters for a query over an [`AccountAware`] entity type.
    pub fn for_account_aware() -> Self {
        Self {
            target_account_aware: true,
            params: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn is_target_account_aware(&self) -> bool {
        self.target_account_aware
    }

    fn has_value(&self, name: &str) -> bool {
        self.params.get(name).is_some_and(|v| !v.is_null())
    }
}

/// Stamps the current tenant on entities before they are written or
/// queried, so no tenant data leaks across accounts.
pub struct TenantStamper {
    api: Arc<dyn AccountServiceApi>,
}

impl TenantStamper {
    pub fn new(api: Arc<dyn AccountServiceApi>) -> Self {
        Self { api }
    }

    async fn tenant_id(&self, caller: CallerContext<'_>) -> Result<Option<i64>, AccountError> {
        if let Some(id) = self.api.fixed_account_id() {
            return Ok(Some(id));
        }
        self.api.current_account_id(caller).await
    }

    pub async fn before_create<E: AccountAware + Send>(
        &self,
        entity: &mut E,
        caller: CallerContext<'_>,
    ) -> Result<(), AccountError> {
        if let Some(id) = self.tenant_id(caller).await? {
            entity.set_account_id(id);
        }
        Ok(())
    }

    /// A pinned tenant always wins; otherwise only unset ids are filled.
    pub async fn before_update<E: AccountAware + Send>(
        &self,
        entity: &mut E,
        caller: CallerContext<'_>,
    ) -> Result<(), AccountError> {
        if let Some(id) = self.api.fixed_account_id() {
            entity.set_account_id(id);
            return Ok(());
        }
        if entity.account_id().is_some() {
            return Ok(());
        }
        if let Some(id) = self.tenant_id(caller).await? {
            entity.set_account_id(id);
        }
        Ok(())
    }

    pub async fn before_query(
        &self,
        params: &mut QueryParameters,
        caller: CallerContext<'_>,
    ) -> Result<(), AccountError> {
        if !params.is_target_account_aware() || params.has_value(ACCOUNT_ID_PARAM) {
            return Ok(());
        }
        if let Some(id) = self.tenant_id(caller).await? {
            params.add(ACCOUNT_ID_PARAM, id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountDto, AccountStatus};
    use async_trait::async_trait;

    struct FixedApi {
        fixed: Option<i64>,
        current: Option<i64>,
    }

    #[async_trait]
    impl AccountServiceApi for FixedApi {
        async fn account_status(&self, _id: i64) -> Result<AccountStatus, AccountError> {
            Ok(AccountStatus::Active)
        }
        async fn account(&self, _id: i64) -> Result<Option<AccountDto>, AccountError> {
            Ok(None)
        }
        async fn system_account_id(&self) -> Result<Option<i64>, AccountError> {
            Ok(None)
        }
        async fn current_account_id(
            &self,
            _caller: CallerContext<'_>,
        ) -> Result<Option<i64>, AccountError> {
            Ok(self.current)
        }
        async fn current_account(
            &self,
            _caller: CallerContext<'_>,
        ) -> Result<Option<AccountDto>, AccountError> {
            Ok(None)
        }
        async fn set_current_account(
            &self,
            _caller: CallerContext<'_>,
            _id: i64,
        ) -> Result<Option<AccountDto>, AccountError> {
            Err(AccountError::Unsupported("set_current_account"))
        }
        async fn account_id_by_domain(&self, _domain: &str) -> Result<Option<i64>, AccountError> {
            Ok(None)
        }
        async fn update_account_users(&self, _: i64, _: u64, _: u64) -> Result<(), AccountError> {
            Ok(())
        }
        async fn find_accounts_id_by_feature(&self, _: &str) -> Result<Vec<i64>, AccountError> {
            Ok(vec![])
        }
        fn fixed_account_id(&self) -> Option<i64> {
            self.fixed
        }
    }

    #[derive(Default)]
    struct Invoice {
        account_id: Option<i64>,
    }

    impl AccountAware for Invoice {
        fn account_id(&self) -> Option<i64> {
            self.account_id
        }
        fn set_account_id(&mut self, account_id: i64) {
            self.account_id = Some(account_id);
        }
    }

    fn stamper(fixed: Option<i64>, current: Option<i64>) -> TenantStamper {
        TenantStamper::new(Arc::new(FixedApi { fixed, current }))
    }

    #[tokio::test]
    async fn create_always_stamps_current_tenant() {
        let mut invoice = Invoice { account_id: Some(3) };
        stamper(None, Some(7))
            .before_create(&mut invoice, CallerContext::none())
            .await
            .unwrap();
        assert_eq!(invoice.account_id, Some(7));
    }

    #[tokio::test]
    async fn update_keeps_existing_tenant_unless_pinned() {
        let mut invoice = Invoice { account_id: Some(3) };
        stamper(None, Some(7))
            .before_update(&mut invoice, CallerContext::none())
            .await
            .unwrap();
        assert_eq!(invoice.account_id, Some(3));

        let mut unset = Invoice::default();
        stamper(None, Some(7))
            .before_update(&mut unset, CallerContext::none())
            .await
            .unwrap();
        assert_eq!(unset.account_id, Some(7));

        stamper(Some(1), Some(7))
            .before_update(&mut invoice, CallerContext::none())
            .await
            .unwrap();
        assert_eq!(invoice.account_id, Some(1));
    }

    #[tokio::test]
    async fn query_gets_tenant_only_for_account_aware_targets() {
        let stamper = stamper(None, Some(7));

        let mut plain = QueryParameters::new();
        stamper
            .before_query(&mut plain, CallerContext::none())
            .await
            .unwrap();
        assert!(plain.get(ACCOUNT_ID_PARAM).is_none());

        let mut aware = QueryParameters::for_account_aware();
        aware.add(ACCOUNT_ID_PARAM, Value::Null);
        stamper
            .before_query(&mut aware, CallerContext::none())
            .await
            .unwrap();
        assert_eq!(aware.get(ACCOUNT_ID_PARAM), Some(&Value::from(7)));

        let mut explicit = QueryParameters::for_account_aware();
        explicit.add(ACCOUNT_ID_PARAM, 2);
        stamper
            .before_query(&mut explicit, CallerContext::none())
            .await
            .unwrap();
        assert_eq!(explicit.get(ACCOUNT_ID_PARAM), Some(&Value::from(2)));
    }
}
