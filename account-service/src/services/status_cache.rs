use dashmap::DashMap;

/// Process-wide "status changed" flags keyed by account id.
///
/// A flag is consumed by the first reader: `is_status_changed` removes the
/// entry in one step, so concurrent readers see `true` at most once per
/// `status_changed` call.
#[derive(Debug, Default)]
pub struct AccountStatusCache {
    flags: DashMap<i64, bool>,
}

impl AccountStatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_changed(&self, account_id: Option<i64>) {
        if let Some(id) = account_id {
            tracing::debug!(account_id = id, "Account status flagged as changed");
            self.flags.insert(id, true);
        }
    }

    pub fn is_status_changed(&self, account_id: Option<i64>) -> bool {
        account_id
            .and_then(|id| self.flags.remove(&id))
            .map(|(_, changed)| changed)
            .unwrap_or(false)
    }
}
