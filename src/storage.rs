//! Persistent settings storage.
//!
//! One JSON file (`settings.json`) in the platform config directory holds
//! every key the crate persists, including the tutorial registry. Loads
//! are lenient (a corrupt file is logged and treated as empty so the app
//! still starts); every mutation is flushed immediately with an atomic
//! temp-file-then-rename write, so the on-disk copy always reflects the
//! latest registered state even if the process terminates.

use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{error, warn};

use crate::error::{Error, Result};

const SETTINGS_FILE: &str = "settings.json";

// Known settings keys.
pub const DEFAULT_URL_SETTING: &str = "defaultUrl";
pub const OPEN_AT_STARTUP_SETTING: &str = "openAtStartup";
pub const AUTO_INSTALL_TUTORIALS_SETTING: &str = "autoInstallDefaultTutorials";
pub const LAST_COLUMN_USED_SETTING: &str = "lastColumnUsed";

/// Filesystem locations the crate persists into.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    /// Directory holding `settings.json`.
    pub settings_dir: PathBuf,
    /// Host "global storage" root; the content cache lives beneath it.
    pub global_storage_dir: PathBuf,
}

impl StoragePaths {
    /// Platform-appropriate locations:
    ///
    /// - settings: `~/.config/guidebook/` (or the OS equivalent)
    /// - global storage: `~/.local/share/guidebook/` (or the OS equivalent)
    ///
    /// Falls back to `~/.guidebook/` when the platform dirs are unavailable.
    pub fn discover() -> Self {
        let fallback = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".guidebook");
        Self {
            settings_dir: dirs::config_dir()
                .map(|d| d.join("guidebook"))
                .unwrap_or_else(|| fallback.clone()),
            global_storage_dir: dirs::data_dir()
                .map(|d| d.join("guidebook"))
                .unwrap_or_else(|| fallback.clone()),
        }
    }

    /// Both locations rooted under one directory. Used by tests and by
    /// hosts that supply their own storage root.
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            settings_dir: dir.to_path_buf(),
            global_storage_dir: dir.to_path_buf(),
        }
    }
}

/// Key-value settings store backed by a single JSON file.
pub struct SettingsStore {
    path: PathBuf,
    values: RwLock<Map<String, Value>>,
}

impl SettingsStore {
    /// Open (or create) the store in `dir`. A missing file is an empty
    /// store; an unreadable or corrupt file is logged and treated as empty.
    pub fn open(dir: &Path) -> Self {
        let path = dir.join(SETTINGS_FILE);
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Map<String, Value>>(&content) {
                Ok(map) => map,
                Err(e) => {
                    error!("corrupt settings file {}: {e}; starting empty", path.display());
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                warn!("could not read settings file {}: {e}; starting empty", path.display());
                Map::new()
            }
        };
        Self {
            path,
            values: RwLock::new(values),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let values = self.values.read();
        let value = values.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("setting \"{key}\" has an unexpected shape: {e}");
                None
            }
        }
    }

    /// Set a key and flush to disk immediately.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let encoded = serde_json::to_value(value)
            .map_err(|e| Error::Settings(format!("cannot encode \"{key}\": {e}")))?;
        let mut values = self.values.write();
        values.insert(key.to_string(), encoded);
        self.flush(&values)
    }

    /// Remove a key entirely (distinct from setting it to an empty value)
    /// and flush to disk immediately.
    pub fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.write();
        if values.remove(key).is_none() {
            return Ok(());
        }
        self.flush(&values)
    }

    // Atomic write: temp file in the same directory, then rename, so the
    // settings file is never observed half-written.
    fn flush(&self, values: &Map<String, Value>) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| Error::Settings("settings path has no parent".into()))?;
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::Settings(format!("cannot create {}: {e}", dir.display())))?;

        let json = serde_json::to_string_pretty(values)
            .map_err(|e| Error::Settings(format!("cannot serialize settings: {e}")))?;
        let temp = dir.join(format!("{SETTINGS_FILE}.tmp.{}", std::process::id()));
        std::fs::write(&temp, json)
            .map_err(|e| Error::Settings(format!("cannot write temp settings: {e}")))?;
        std::fs::rename(&temp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            Error::Settings(format!("cannot commit settings: {e}"))
        })
    }

    // -- typed accessors for the known keys --

    pub fn default_url(&self) -> Option<String> {
        self.get(DEFAULT_URL_SETTING)
    }

    pub fn set_default_url(&self, url: &str) -> Result<()> {
        self.set(DEFAULT_URL_SETTING, &url)
    }

    pub fn open_at_startup(&self) -> bool {
        self.get(OPEN_AT_STARTUP_SETTING).unwrap_or(false)
    }

    /// Whether the bundled tutorials are (re-)registered at startup.
    /// Defaults to true, matching a fresh install.
    pub fn auto_install_default_tutorials(&self) -> bool {
        self.get(AUTO_INSTALL_TUTORIALS_SETTING).unwrap_or(true)
    }

    pub fn last_column_used(&self) -> Option<i32> {
        self.get(LAST_COLUMN_USED_SETTING)
    }

    pub fn set_last_column_used(&self, column: i32) -> Result<()> {
        self.set(LAST_COLUMN_USED_SETTING, &column)
    }
}
