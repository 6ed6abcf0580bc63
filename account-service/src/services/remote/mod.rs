//! Clients treating a central admin server as the source of truth for the
//! account of an on-prem installation.

mod client;
mod endpoint;
pub mod fingerprint;
mod one_time;
pub mod preferences;
mod stats;

pub use client::{RemoteAccountClient, SyncSnapshot};
pub use endpoint::RemoteEndpoint;
pub use fingerprint::HardwareFingerprint;
pub use one_time::OfflineCache;
pub use preferences::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
pub use stats::{AccountStatsProvider, StatsJob};

use serde::Deserialize;
use std::time::Duration;

/// Settings shared by both remote client variants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteAccountConfig {
    pub server_url: String,
    pub account_uuid: String,
    /// Local tenant id pinned over whatever id the server reports.
    pub default_id: Option<i64>,
    pub sync_ttl_secs: u64,
    /// Failures tolerated before the placeholder turns CANCELED.
    pub degrade_after: u32,
    /// Failures after which the client stops serving an account at all.
    pub fail_after: u32,
    pub send_diagnostics: bool,
    pub offline_cache_max_age_months: u32,
    /// Seat limit applied to the offline copy.
    pub max_users: u32,
    pub request_timeout_secs: u64,
    pub hardware_id: Option<String>,
    /// Hour of day (UTC) for the daily stats push.
    pub stats_hour: u32,
    pub local_port: u16,
    pub datasource: Option<String>,
}

impl Default for RemoteAccountConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            account_uuid: String::new(),
            default_id: None,
            sync_ttl_secs: 3600,
            degrade_after: 5,
            fail_after: 10,
            send_diagnostics: true,
            offline_cache_max_age_months: 6,
            max_users: 10,
            request_timeout_secs: 10,
            hardware_id: None,
            stats_hour: 6,
            local_port: 8080,
            datasource: None,
        }
    }
}

impl RemoteAccountConfig {
    pub fn new(server_url: impl Into<String>, account_uuid: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            account_uuid: account_uuid.into(),
            ..Default::default()
        }
    }

    /// Saturates at `chrono::Duration::MAX` for values chrono cannot hold.
    pub fn sync_ttl(&self) -> chrono::Duration {
        i64::try_from(self.sync_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn is_configured(&self) -> bool {
        !self.server_url.is_empty() && !self.account_uuid.is_empty()
    }
}
