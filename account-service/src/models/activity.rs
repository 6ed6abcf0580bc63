use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named per-account setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountParameter {
    pub account_id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AccountParameter {
    pub fn new(account_id: i64, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            account_id,
            name: name.into(),
            value: Some(value.into()),
            description: None,
        }
    }
}

/// Activity entry recorded against an account, such as a remote
/// license check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLog {
    pub account_id: i64,
    pub creation_date: DateTime<Utc>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<String>,
}

impl AccountLog {
    pub fn new(account_id: i64, message: impl Into<String>) -> Self {
        Self {
            account_id,
            creation_date: Utc::now(),
            message: message.into(),
            ip_address: None,
            path_info: None,
            client_info: None,
        }
    }

    pub fn with_ip_address(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }

    pub fn with_path_info(mut self, path: impl Into<String>) -> Self {
        self.path_info = Some(path.into());
        self
    }

    pub fn with_client_info(mut self, info: Option<String>) -> Self {
        self.client_info = info;
        self
    }
}
