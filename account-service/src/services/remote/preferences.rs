//! Small persistent key/value store for per-user installation state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::services::AccountError;

/// Per-user preference storage, modelled after OS preference stores:
/// writes are buffered until `flush`.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn put(&self, key: &str, value: &str) -> Result<(), AccountError>;

    fn flush(&self) -> Result<(), AccountError>;

    fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    fn put_i64(&self, key: &str, value: i64) -> Result<(), AccountError> {
        self.put(key, &value.to_string())
    }
}

fn lock_err<T>(_: T) -> AccountError {
    AccountError::Preferences("preference store lock poisoned".to_string())
}

/// JSON file backed store.
///
/// Default location:
/// - Linux: ~/.config/dynamia/preferences.json
/// - macOS: ~/Library/Application Support/dynamia/preferences.json
/// - Windows: %APPDATA%\dynamia\preferences.json
pub struct FilePreferenceStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FilePreferenceStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AccountError> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| {
                    AccountError::Preferences(format!("Cannot read {}: {e}", path.display()))
                })?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Store under the platform configuration directory.
    pub fn user_default() -> Result<Self, AccountError> {
        Self::open(Self::default_path()?)
    }

    pub fn default_path() -> Result<PathBuf, AccountError> {
        let base = dirs::config_dir().ok_or_else(|| {
            AccountError::Preferences("Could not determine configuration directory".to_string())
        })?;
        Ok(base.join("dynamia").join("preferences.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) -> Result<(), AccountError> {
        self.entries
            .lock()
            .map_err(lock_err)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn flush(&self) -> Result<(), AccountError> {
        let json = {
            let entries = self.entries.lock().map_err(lock_err)?;
            serde_json::to_string_pretty(&*entries)?
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| {
                    AccountError::Preferences(format!("Cannot create {}: {e}", parent.display()))
                })?;
        }
        std::fs::write(&self.path, json)
            .map_err(|e| {
                AccountError::Preferences(format!("Cannot write {}: {e}", self.path.display()))
            })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, perms)
                .map_err(|e| AccountError::Preferences(e.to_string()))?;
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) -> Result<(), AccountError> {
        self.entries
            .lock()
            .map_err(lock_err)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn flush(&self) -> Result<(), AccountError> {
        Ok(())
    }
}
