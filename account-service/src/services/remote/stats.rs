use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::client::RemoteAccountClient;
use crate::models::AccountStats;

/// Contributes usage figures to the daily stats push.
#[async_trait]
pub trait AccountStatsProvider: Send + Sync {
    async fn account_stats(&self, account_id: i64) -> Vec<AccountStats>;
}

/// Daily push of account stats to the admin server.
pub struct StatsJob {
    client: Arc<RemoteAccountClient>,
    hour: u32,
    shutdown: CancellationToken,
}

impl StatsJob {
    pub fn new(client: Arc<RemoteAccountClient>) -> Self {
        let hour = client.config().stats_hour;
        Self {
            client,
            hour,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Next `hour:00:00` UTC strictly after `now`.
    pub fn next_run(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
        let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
        let today = now.date_naive().and_time(at).and_utc();
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tracing::info!(hour = self.hour, "Starting daily stats job");
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next = Self::next_run(now, self.hour);
                let wait = (next - now).to_std().unwrap_or_default();

                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        tracing::info!("Stats job shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(wait) => {
                        match self.client.send_stats().await {
                            Ok(Some(_)) => {}
                            Ok(None) => tracing::debug!("No account loaded yet, stats skipped"),
                            Err(e) => tracing::error!(error = %e, "Failed to send account stats"),
                        }
                    }
                }
            }
        })
    }
}
