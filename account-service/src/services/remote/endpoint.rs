use reqwest::Client;
use service_core::observability::TracedClientExt;

use super::fingerprint::{local_info, HardwareFingerprint};
use super::RemoteAccountConfig;
use crate::models::{AccountDto, AccountStatsList};
use crate::services::AccountError;

/// HTTP access to the admin server's account endpoints.
#[derive(Clone)]
pub struct RemoteEndpoint {
    client: Client,
    config: RemoteAccountConfig,
    hardware: HardwareFingerprint,
}

impl RemoteEndpoint {
    pub fn new(config: RemoteAccountConfig) -> Result<Self, AccountError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let hardware = HardwareFingerprint::resolve(config.hardware_id.as_deref());
        Ok(Self {
            client,
            config,
            hardware,
        })
    }

    pub fn config(&self) -> &RemoteAccountConfig {
        &self.config
    }

    pub fn hardware_id(&self) -> &str {
        self.hardware.as_str()
    }

    pub fn admin_url(&self) -> String {
        format!(
            "{}/api/saas/account/{}",
            self.config.server_url.trim_end_matches('/'),
            self.config.account_uuid
        )
    }

    pub fn stats_url(&self) -> String {
        format!("{}/stats", self.admin_url())
    }

    /// GET the account snapshot. Diagnostics are attached when enabled and
    /// requested.
    #[tracing::instrument(skip(self), fields(url = %self.admin_url()))]
    pub async fn fetch_account(&self, with_diagnostics: bool) -> Result<AccountDto, AccountError> {
        let mut query: Vec<(&str, String)> = Vec::with_capacity(2);
        if with_diagnostics && self.config.send_diagnostics {
            query.push((
                "info",
                local_info(self.config.local_port, self.config.datasource.as_deref()),
            ));
        }
        query.push(("uuid", self.hardware.as_str().to_string()));

        let dto = self
            .client
            .traced_get(&self.admin_url())
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json::<AccountDto>()
            .await?;
        Ok(dto)
    }

    /// POST usage stats; returns the server's response text.
    #[tracing::instrument(
        skip(self, stats),
        fields(url = %self.stats_url(), count = stats.data.len())
    )]
    pub async fn post_stats(&self, stats: &AccountStatsList) -> Result<String, AccountError> {
        let text = self
            .client
            .traced_post(&self.stats_url())
            .json(stats)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(text)
    }
}
