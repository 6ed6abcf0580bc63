//! One-time license check with an offline copy.
//!
//! The first successful check of an installation is persisted locally so
//! the installation keeps working through long outages of the admin
//! server. The copy expires after a configured number of months.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Months, Utc};
use std::sync::Arc;

use super::client::{RemoteAccountClient, SyncMode, SyncState};
use super::fingerprint::sha256_hex;
use super::preferences::PreferenceStore;
use super::RemoteAccountConfig;
use crate::models::{AccountDto, AccountStatus};
use crate::services::clock::SystemClock;
use crate::services::metrics::record_remote_sync;
use crate::services::AccountError;

const INVALID_LICENSE: &str = "invalid license";

/// Locally persisted account snapshot.
pub struct OfflineCache {
    store: Arc<dyn PreferenceStore>,
    key: String,
    timestamp_key: String,
    max_age: Months,
}

impl OfflineCache {
    pub fn new(
        store: Arc<dyn PreferenceStore>,
        hardware_id: &str,
        account_uuid: &str,
        max_age_months: u32,
    ) -> Self {
        let key = format!("{}_ERP", sha256_hex(&format!("{hardware_id}${account_uuid}")));
        let timestamp_key = format!("{key}.");
        Self {
            store,
            key,
            timestamp_key,
            max_age: Months::new(max_age_months),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn timestamp_key(&self) -> &str {
        &self.timestamp_key
    }

    fn is_expired(&self, stored_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match stored_at.checked_add_months(self.max_age) {
            Some(expires) => now >= expires,
            None => true,
        }
    }

    /// Stored snapshot, when present, readable and fresh enough.
    ///
    /// An expired copy is dropped and its timestamp restarted.
    pub fn load(&self, now: DateTime<Utc>) -> Option<AccountDto> {
        let encoded = self.store.get(&self.key)?;
        let written = self.store.get_i64(&self.timestamp_key).unwrap_or(0);
        if written == 0 || encoded.is_empty() {
            return None;
        }

        let stored_at = DateTime::<Utc>::from_timestamp_millis(written)?;
        if self.is_expired(stored_at, now) {
            tracing::info!(stored_at = %stored_at, "Offline account copy expired");
            if let Err(e) = self
                .store
                .put_i64(&self.timestamp_key, now.timestamp_millis())
                .and_then(|_| self.store.flush())
            {
                tracing::warn!(error = %e, "Cannot restart offline copy timestamp");
            }
            return None;
        }

        match decode(&encoded) {
            Ok(dto) => Some(dto),
            Err(e) => {
                tracing::warn!(error = %e, "Offline account copy unreadable");
                None
            }
        }
    }

    pub fn store(&self, dto: &AccountDto, now: DateTime<Utc>) -> Result<(), AccountError> {
        let encoded = BASE64.encode(serde_json::to_vec(dto)?);
        self.store.put(&self.key, &encoded)?;
        self.store
            .put_i64(&self.timestamp_key, now.timestamp_millis())?;
        self.store.flush()
    }
}

fn decode(encoded: &str) -> Result<AccountDto, AccountError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| AccountError::Preferences(format!("Invalid offline copy encoding: {e}")))?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl RemoteAccountClient {
    /// Client that checks the admin server once per process and keeps an
    /// offline copy of the first active answer in `store`.
    pub fn one_time(
        config: RemoteAccountConfig,
        store: Arc<dyn PreferenceStore>,
    ) -> Result<Self, AccountError> {
        let mut client = Self::with_mode(config, SyncMode::Periodic, Arc::new(SystemClock))?;
        let cache = OfflineCache::new(
            store,
            client.endpoint().hardware_id(),
            &client.config().account_uuid,
            client.config().offline_cache_max_age_months,
        );
        client.mode = SyncMode::OneTime(cache);
        Ok(client)
    }

    pub fn is_one_time(&self) -> bool {
        matches!(self.mode, SyncMode::OneTime(_))
    }

    pub(super) async fn sync_one_time(&self, cache: &OfflineCache, state: &mut SyncState) {
        let now = self.clock.now();

        if let Some(mut dto) = cache.load(now) {
            dto.max_users = Some(self.config().max_users);
            tracing::info!(account_id = ?dto.id, "Account loaded from offline copy");
            record_remote_sync("offline_copy", state.fail_count);
            state.account = Some(dto);
            return;
        }

        match self.endpoint.fetch_account(false).await {
            Ok(mut dto) if dto.status == AccountStatus::Active => {
                self.apply_default_id(&mut dto);
                if let Err(e) = cache.store(&dto, now) {
                    tracing::warn!(error = %e, "Cannot persist offline account copy");
                }
                record_remote_sync("success", 0);
                state.fail_count = 0;
                state.last_sync = Some(now);
                state.last_good = Some(dto.clone());
                state.account = Some(dto);
                return;
            }
            Ok(dto) => {
                tracing::warn!(status = %dto.status, "Remote account is not active");
                record_remote_sync("inactive", state.fail_count);
            }
            Err(e) => {
                state.fail_count += 1;
                tracing::warn!(error = %e, "Remote account check failed");
                record_remote_sync("fail_closed", state.fail_count);
            }
        }

        let mut placeholder = AccountDto::temporary(self.config().default_id);
        placeholder.status = AccountStatus::New;
        placeholder.status_description = Some(INVALID_LICENSE.to_string());
        state.account = Some(placeholder);
    }
}
