use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

use crate::services::remote::RemoteAccountConfig;
use crate::services::resolver::DEFAULT_ACCOUNT_HEADER;

#[derive(Debug, Clone, Deserialize)]
pub struct AccountServiceConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub session: SessionConfig,
    pub resolver: ResolverConfig,
    /// Present when this installation checks its account against a
    /// central admin server.
    pub remote: Option<RemoteConfig>,
    /// JSON array of accounts loaded into the in-memory repository.
    pub seed_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub inactivity_minutes: i64,
    pub secure_cookie: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    pub account_header: String,
    /// Requests arrive through an authenticating gateway. Only then are
    /// the account and principal headers honoured.
    pub trusted_gateway: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    #[serde(flatten)]
    pub account: RemoteAccountConfig,
    /// Check once and keep an offline copy instead of polling.
    pub one_time: bool,
    pub preferences_path: Option<String>,
}

impl AccountServiceConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_prod = common.is_prod();
        let env = Lookup { lookup, is_prod };

        let remote = match (
            env.optional("REMOTE_SERVER_URL"),
            env.optional("REMOTE_ACCOUNT_UUID"),
        ) {
            (Some(server_url), Some(account_uuid)) => {
                let defaults = RemoteAccountConfig::default();
                let account = RemoteAccountConfig {
                    server_url,
                    account_uuid,
                    default_id: env.parsed_opt("REMOTE_DEFAULT_ID")?,
                    sync_ttl_secs: env.parsed("REMOTE_SYNC_TTL_SECS", defaults.sync_ttl_secs)?,
                    degrade_after: env.parsed("REMOTE_DEGRADE_AFTER", defaults.degrade_after)?,
                    fail_after: env.parsed("REMOTE_FAIL_AFTER", defaults.fail_after)?,
                    send_diagnostics: env
                        .parsed("REMOTE_SEND_DIAGNOSTICS", defaults.send_diagnostics)?,
                    offline_cache_max_age_months: env.parsed(
                        "REMOTE_OFFLINE_MAX_AGE_MONTHS",
                        defaults.offline_cache_max_age_months,
                    )?,
                    max_users: env.parsed("REMOTE_MAX_USERS", defaults.max_users)?,
                    request_timeout_secs: env
                        .parsed("REMOTE_REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
                    hardware_id: env.optional("REMOTE_HARDWARE_ID"),
                    stats_hour: env.parsed("REMOTE_STATS_HOUR", defaults.stats_hour)?,
                    local_port: common.port,
                    datasource: env.optional("DATASOURCE_URL"),
                };
                Some(RemoteConfig {
                    account,
                    one_time: env.parsed("REMOTE_ONE_TIME", false)?,
                    preferences_path: env.optional("PREFERENCES_PATH"),
                })
            }
            (None, None) => None,
            _ => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "REMOTE_SERVER_URL and REMOTE_ACCOUNT_UUID must be set together"
                )))
            }
        };

        let seed_file = if is_prod {
            env.optional("ACCOUNTS_SEED_FILE")
        } else {
            Some(env.get("ACCOUNTS_SEED_FILE", Some(""))?).filter(|s| !s.is_empty())
        };

        Ok(AccountServiceConfig {
            session: SessionConfig {
                inactivity_minutes: env.parsed("SESSION_INACTIVITY_MINUTES", 30)?,
                secure_cookie: env.parsed("SESSION_SECURE_COOKIE", is_prod)?,
            },
            resolver: ResolverConfig {
                account_header: env
                    .optional("ACCOUNT_HEADER")
                    .unwrap_or_else(|| DEFAULT_ACCOUNT_HEADER.to_string()),
                trusted_gateway: env.parsed("TRUSTED_GATEWAY", false)?,
            },
            remote,
            seed_file,
            common,
        })
    }
}

struct Lookup<F> {
    lookup: F,
    is_prod: bool,
}

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn get(&self, key: &str, default: Option<&str>) -> Result<String, AppError> {
        get_env(key, default, self.is_prod, &self.lookup)
    }

    fn parsed<T: FromStr>(&self, key: &str, default: T) -> Result<T, AppError> {
        match self.optional(key) {
            Some(raw) => parse(key, &raw),
            None => Ok(default),
        }
    }

    fn parsed_opt<T: FromStr>(&self, key: &str) -> Result<Option<T>, AppError> {
        self.optional(key).map(|raw| parse(key, &raw)).transpose()
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, raw))
        })
}

fn get_env<F>(
    key: &str,
    default: Option<&str>,
    is_prod: bool,
    lookup: &F,
) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
