use serde::{Deserialize, Serialize};

/// A single named usage metric reported by an installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStats {
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

impl AccountStats {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            description: None,
            module: None,
        }
    }
}

/// Body of the stats push.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountStatsList {
    #[serde(default)]
    pub data: Vec<AccountStats>,
}

impl AccountStatsList {
    pub fn extend(&mut self, stats: impl IntoIterator<Item = AccountStats>) {
        self.data.extend(stats);
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
