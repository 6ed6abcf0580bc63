use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::AccountStatus;

/// Read projection of an account, as exchanged with the admin server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identification: Option<String>,
    pub status: AccountStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    pub remote: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_users: Option<u32>,
    #[serde(rename = "type")]
    pub account_type: AccountTypeDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_uuid: Option<String>,
    pub required_instance_uuid: bool,
    pub features: Vec<AccountFeatureDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_message: Option<String>,
    pub show_global_message: bool,
}

impl AccountDto {
    /// Stand-in snapshot used while the admin server cannot be reached.
    pub fn temporary(id: Option<i64>) -> Self {
        Self {
            id,
            name: Some("Temporary Account".to_string()),
            identification: Some("0000".to_string()),
            status: AccountStatus::Active,
            remote: true,
            creation_date: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Own limit when positive, otherwise the account type's.
    pub fn effective_max_users(&self) -> u32 {
        match self.max_users {
            Some(n) if n > 0 => n,
            _ => self.account_type.max_users,
        }
    }

    pub fn has_feature(&self, name: &str) -> bool {
        self.features
            .iter()
            .find(|f| f.provider_id == name)
            .map(|f| f.enabled)
            .unwrap_or(false)
    }

    pub fn is_admin(&self) -> bool {
        self.account_type.name.as_deref() == Some("admin")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountTypeDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub max_users: u32,
    pub allow_additional_users: bool,
    pub payment_required: bool,
    pub printing_support: bool,
    pub trial: bool,
    pub trial_days: u32,
}

impl Default for AccountTypeDto {
    fn default() -> Self {
        Self {
            id: None,
            name: None,
            max_users: 1,
            allow_additional_users: false,
            payment_required: false,
            printing_support: false,
            trial: false,
            trial_days: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountFeatureDto {
    pub provider_id: String,
    #[serde(default)]
    pub enabled: bool,
}
