use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::dto::{AccountDto, AccountFeatureDto, AccountTypeDto};
use super::stats::AccountStats;
use crate::services::AccountStatusCache;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    #[default]
    New,
    Active,
    Suspended,
    Canceled,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccountStatus::New => "NEW",
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Suspended => "SUSPENDED",
            AccountStatus::Canceled => "CANCELED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountType {
    pub id: Option<i64>,
    pub name: String,
    pub max_users: u32,
    pub allow_additional_users: bool,
    pub payment_required: bool,
    pub printing_support: bool,
    pub trial: bool,
    pub trial_days: u32,
}

impl Default for AccountType {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            max_users: 1,
            allow_additional_users: false,
            payment_required: false,
            printing_support: false,
            trial: false,
            trial_days: 0,
        }
    }
}

impl AccountType {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_admin(&self) -> bool {
        self.name == "admin"
    }

    pub fn to_dto(&self) -> AccountTypeDto {
        AccountTypeDto {
            id: self.id,
            name: Some(self.name.clone()),
            max_users: self.max_users,
            allow_additional_users: self.allow_additional_users,
            payment_required: self.payment_required,
            printing_support: self.printing_support,
            trial: self.trial,
            trial_days: self.trial_days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountFeature {
    pub provider_id: String,
    pub enabled: bool,
}

/// Tenant entity as owned by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub subdomain: Option<String>,
    pub custom_domain: Option<String>,
    pub email: Option<String>,
    pub identification: Option<String>,
    pub locale: Option<String>,
    pub time_zone: Option<String>,
    status: AccountStatus,
    pub status_description: Option<String>,
    pub status_date: Option<DateTime<Utc>>,
    pub account_type: AccountType,
    pub remote: bool,
    pub creation_date: DateTime<Utc>,
    pub max_users: Option<u32>,
    pub users: u64,
    pub active_users: u64,
    pub instance_uuid: Option<String>,
    pub required_instance_uuid: bool,
    pub features: Vec<AccountFeature>,
    pub stats: Vec<AccountStats>,
    pub global_message: Option<String>,
    pub show_global_message: bool,
}

impl Account {
    pub fn new(id: i64, uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            uuid: uuid.into(),
            name: name.into(),
            subdomain: None,
            custom_domain: None,
            email: None,
            identification: None,
            locale: None,
            time_zone: None,
            status: AccountStatus::New,
            status_description: None,
            status_date: None,
            account_type: AccountType::default(),
            remote: false,
            creation_date: Utc::now(),
            max_users: None,
            users: 0,
            active_users: 0,
            instance_uuid: None,
            required_instance_uuid: false,
            features: Vec::new(),
            stats: Vec::new(),
            global_message: None,
            show_global_message: false,
        }
    }

    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    pub fn status(&self) -> AccountStatus {
        self.status
    }

    /// Change the status, stamping the status date and flagging the account
    /// as dirty in `status_cache` when the value actually changes.
    pub fn set_status(&mut self, status: AccountStatus, status_cache: &AccountStatusCache) {
        if status != self.status {
            self.status_date = Some(Utc::now());
            status_cache.status_changed(Some(self.id));
        }
        self.status = status;
    }

    pub fn is_admin(&self) -> bool {
        self.account_type.is_admin()
    }

    pub fn find_stats_mut(&mut self, name: &str) -> Option<&mut AccountStats> {
        self.stats.iter_mut().find(|s| s.name == name)
    }

    /// Upsert stats by name.
    pub fn merge_stats(&mut self, stats: Vec<AccountStats>) {
        for s in stats {
            match self.find_stats_mut(&s.name) {
                Some(existing) => *existing = s,
                None => self.stats.push(s),
            }
        }
    }

    pub fn to_dto(&self) -> AccountDto {
        AccountDto {
            id: Some(self.id),
            uuid: Some(self.uuid.clone()),
            name: Some(self.name.clone()),
            subdomain: self.subdomain.clone(),
            custom_domain: self.custom_domain.clone(),
            email: self.email.clone(),
            identification: self.identification.clone(),
            status: self.status,
            status_description: self.status_description.clone(),
            status_date: self.status_date,
            locale: self.locale.clone(),
            time_zone: self.time_zone.clone(),
            remote: self.remote,
            creation_date: Some(self.creation_date),
            max_users: self.max_users,
            account_type: self.account_type.to_dto(),
            instance_uuid: self.instance_uuid.clone(),
            required_instance_uuid: self.required_instance_uuid,
            features: self
                .features
                .iter()
                .map(|f| AccountFeatureDto {
                    provider_id: f.provider_id.clone(),
                    enabled: f.enabled,
                })
                .collect(),
            global_message: self.global_message.clone(),
            show_global_message: self.show_global_message,
        }
    }

    /// Rebuild an entity from a remote snapshot. Snapshots without an id
    /// cannot be mapped to a tenant.
    pub fn from_dto(dto: &AccountDto) -> Option<Self> {
        let id = dto.id?;
        let mut account = Account::new(
            id,
            dto.uuid.clone().unwrap_or_default(),
            dto.name.clone().unwrap_or_default(),
        );
        account.subdomain = dto.subdomain.clone();
        account.custom_domain = dto.custom_domain.clone();
        account.email = dto.email.clone();
        account.identification = dto.identification.clone();
        account.locale = dto.locale.clone();
        account.time_zone = dto.time_zone.clone();
        account.status = dto.status;
        account.status_description = dto.status_description.clone();
        account.status_date = dto.status_date;
        account.remote = dto.remote;
        if let Some(created) = dto.creation_date {
            account.creation_date = created;
        }
        account.max_users = dto.max_users;
        account.account_type = AccountType {
            id: dto.account_type.id,
            name: dto.account_type.name.clone().unwrap_or_default(),
            max_users: dto.account_type.max_users,
            allow_additional_users: dto.account_type.allow_additional_users,
            payment_required: dto.account_type.payment_required,
            printing_support: dto.account_type.printing_support,
            trial: dto.account_type.trial,
            trial_days: dto.account_type.trial_days,
        };
        account.instance_uuid = dto.instance_uuid.clone();
        account.required_instance_uuid = dto.required_instance_uuid;
        account.features = dto
            .features
            .iter()
            .map(|f| AccountFeature {
                provider_id: f.provider_id.clone(),
                enabled: f.enabled,
            })
            .collect();
        account.global_message = dto.global_message.clone();
        account.show_global_message = dto.show_global_message;
        Some(account)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
