use async_trait::async_trait;
use chrono_tz::Tz;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::repository::AccountRepository;
use super::AccountError;
use crate::models::{Account, AccountDto};

/// Session key under which the holder is stored.
pub const SESSION_HOLDER_KEY: &str = "account_session_holder";

const FALLBACK_LOCALE: &str = "en-US";

/// Per-session cache of the resolved account.
///
/// Empty until `set_current` succeeds once; afterwards it keeps pointing at
/// an account for the life of the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSessionHolder {
    current_id: Option<i64>,
    current_dto: Option<AccountDto>,
    account_locale: Option<String>,
    account_time_zone: Option<String>,
}

impl AccountSessionHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_id(&self) -> Option<i64> {
        self.current_id
    }

    pub fn is_empty(&self) -> bool {
        self.current_id.is_none()
    }

    pub fn to_dto(&self) -> Option<&AccountDto> {
        self.current_dto.as_ref()
    }

    /// Fetch the cached account. A repository failure reads as "no account".
    pub async fn current(&self, repository: &dyn AccountRepository) -> Option<Account> {
        let id = self.current_id?;
        match repository.find_by_id(id).await {
            Ok(account) => account,
            Err(e) => {
                tracing::warn!(error = %e, account_id = id, "Cannot load session account");
                None
            }
        }
    }

    /// Bind the holder to `account`, re-reading it in a transaction.
    ///
    /// Returns `false` and leaves the holder untouched when the account
    /// cannot be loaded.
    pub async fn set_current(
        &mut self,
        account: &Account,
        repository: &dyn AccountRepository,
    ) -> bool {
        let fresh = match repository.find_by_id_in_transaction(account.id).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => {
                tracing::warn!(account_id = account.id, "Session account vanished before caching");
                return false;
            }
            Err(e) => {
                tracing::warn!(error = %e, account_id = account.id, "Cannot cache session account");
                return false;
            }
        };

        self.account_locale = fresh.locale.as_deref().and_then(parse_language_tag);
        self.account_time_zone = fresh
            .time_zone
            .as_deref()
            .and_then(|z| z.trim().parse::<Tz>().ok())
            .map(|tz| tz.name().to_string());
        self.current_id = Some(fresh.id);
        self.current_dto = Some(fresh.to_dto());
        true
    }

    /// Account locale, or the process default.
    pub fn account_locale(&self) -> String {
        self.account_locale
            .clone()
            .unwrap_or_else(default_locale)
    }

    /// Account time zone, or the process default.
    pub fn account_time_zone(&self) -> Tz {
        self.account_time_zone
            .as_deref()
            .and_then(|z| z.parse().ok())
            .unwrap_or_else(default_time_zone)
    }
}

/// Normalize a BCP-47-ish tag (`es_CO` -> `es-CO`). Returns `None` for
/// anything that is not syntactically a language tag.
pub fn parse_language_tag(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let raw = raw.split(['.', '@']).next().unwrap_or(raw);
    if raw.is_empty() {
        return None;
    }

    let mut parts = raw.split(['-', '_']);
    let language = parts.next()?;
    if !(2..=8).contains(&language.len()) || !language.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut tag = language.to_ascii_lowercase();
    for (i, part) in parts.enumerate() {
        if part.is_empty() || part.len() > 8 || !part.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        tag.push('-');
        if i == 0 && part.len() == 2 {
            tag.push_str(&part.to_ascii_uppercase());
        } else {
            tag.push_str(part);
        }
    }
    Some(tag)
}

pub fn default_locale() -> String {
    ["LC_ALL", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .filter(|v| v != "C" && v != "POSIX")
        .find_map(|v| parse_language_tag(&v))
        .unwrap_or_else(|| FALLBACK_LOCALE.to_string())
}

pub fn default_time_zone() -> Tz {
    std::env::var("TZ")
        .ok()
        .and_then(|tz| tz.trim_start_matches(':').parse().ok())
        .unwrap_or(Tz::UTC)
}

/// Where the holder lives between requests.
#[async_trait]
pub trait SessionScope: Send + Sync {
    async fn load(&self) -> Result<Option<AccountSessionHolder>, AccountError>;

    async fn save(&self, holder: &AccountSessionHolder) -> Result<(), AccountError>;
}

#[async_trait]
impl SessionScope for tower_sessions::Session {
    async fn load(&self) -> Result<Option<AccountSessionHolder>, AccountError> {
        Ok(self.get::<AccountSessionHolder>(SESSION_HOLDER_KEY).await?)
    }

    async fn save(&self, holder: &AccountSessionHolder) -> Result<(), AccountError> {
        self.insert(SESSION_HOLDER_KEY, holder).await?;
        Ok(())
    }
}

/// Holders for execution contexts without an HTTP session (jobs, tests).
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    holders: Arc<DashMap<String, AccountSessionHolder>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(&self, session_id: impl Into<String>) -> MemorySessionScope {
        MemorySessionScope {
            session_id: session_id.into(),
            holders: self.holders.clone(),
        }
    }

    pub fn invalidate(&self, session_id: &str) {
        self.holders.remove(session_id);
    }

    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }
}

pub struct MemorySessionScope {
    session_id: String,
    holders: Arc<DashMap<String, AccountSessionHolder>>,
}

#[async_trait]
impl SessionScope for MemorySessionScope {
    async fn load(&self) -> Result<Option<AccountSessionHolder>, AccountError> {
        Ok(self.holders.get(&self.session_id).map(|h| h.value().clone()))
    }

    async fn save(&self, holder: &AccountSessionHolder) -> Result<(), AccountError> {
        self.holders.insert(self.session_id.clone(), holder.clone());
        Ok(())
    }
}
