//! Tutorial registry: the persisted catalog of registered tutorials.
//!
//! Each entry is an independently JSON-encoded string; the registry is the
//! ordered sequence of those strings stored under a single settings key.
//! The (name, category) pair is unique — name comparison case-insensitive,
//! category comparison exact. The registry is absent (not empty) until the
//! first registration and can be cleared back to absent.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::storage::SettingsStore;

/// Settings key holding the serialized entry sequence.
pub const REGISTERED_TUTORIALS_KEY: &str = "registeredTutorials";

/// One registered tutorial: a named, categorized pointer to a renderable
/// document (file path or http/https URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorialEntry {
    pub name: String,
    pub category: String,
    pub source_uri: String,
}

impl TutorialEntry {
    fn matches(&self, name: &str, category: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) && self.category == category
    }
}

type ChangeObserver = Box<dyn Fn() + Send + Sync>;

/// Process-wide tutorial registry. Every mutation is flushed straight
/// through the settings store; observers (the tree-view layer) are told
/// after each successful mutation.
pub struct TutorialRegistry {
    settings: Arc<SettingsStore>,
    observers: Mutex<Vec<ChangeObserver>>,
}

impl TutorialRegistry {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        Self {
            settings,
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to registry changes. Used by the view layer to refresh.
    pub fn on_change(&self, observer: impl Fn() + Send + Sync + 'static) {
        self.observers.lock().push(Box::new(observer));
    }

    fn notify(&self) {
        for observer in self.observers.lock().iter() {
            observer();
        }
    }

    // The raw persisted sequence. Entries that fail to parse are kept on
    // disk untouched and skipped at read time.
    fn raw(&self) -> Option<Vec<String>> {
        self.settings.get::<Vec<String>>(REGISTERED_TUTORIALS_KEY)
    }

    fn parse(raw: &str) -> Option<TutorialEntry> {
        match serde_json::from_str(raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skipping unreadable registry entry {raw:?}: {e}");
                None
            }
        }
    }

    /// Register a tutorial. Fails with `DuplicateEntry` when the
    /// (name, category) pair is already present; the registry is left
    /// untouched by a failed call.
    pub fn register(&self, name: &str, source_uri: &str, category: &str) -> Result<()> {
        let mut raw = self.raw().unwrap_or_default();
        let duplicate = raw
            .iter()
            .filter_map(|s| Self::parse(s))
            .any(|e| e.matches(name, category));
        if duplicate {
            return Err(Error::DuplicateEntry {
                name: name.to_string(),
                category: category.to_string(),
            });
        }

        let entry = TutorialEntry {
            name: name.to_string(),
            category: category.to_string(),
            source_uri: source_uri.to_string(),
        };
        let encoded = serde_json::to_string(&entry)
            .map_err(|e| Error::Settings(format!("cannot encode tutorial entry: {e}")))?;
        raw.push(encoded);
        self.settings.set(REGISTERED_TUTORIALS_KEY, &raw)?;
        debug!("registered tutorial \"{name}\" in category \"{category}\"");
        self.notify();
        Ok(())
    }

    /// Remove the entry matching (name, category). A no-op when the
    /// registry is absent or holds no such entry.
    pub fn remove(&self, name: &str, category: &str) -> Result<()> {
        let Some(raw) = self.raw() else {
            return Ok(());
        };
        let mut removed = false;
        let kept: Vec<String> = raw
            .into_iter()
            .filter(|s| {
                if removed {
                    return true;
                }
                match Self::parse(s) {
                    Some(e) if e.matches(name, category) => {
                        removed = true;
                        false
                    }
                    _ => true,
                }
            })
            .collect();
        if !removed {
            return Ok(());
        }
        self.settings.set(REGISTERED_TUTORIALS_KEY, &kept)?;
        debug!("removed tutorial \"{name}\" from category \"{category}\"");
        self.notify();
        Ok(())
    }

    /// Reset the persisted registry back to absent. Observers are told
    /// unless `suppress_notification` is set.
    pub fn clear(&self, suppress_notification: bool) -> Result<()> {
        self.settings.remove(REGISTERED_TUTORIALS_KEY)?;
        debug!("cleared tutorial registry");
        if !suppress_notification {
            self.notify();
        }
        Ok(())
    }

    /// The registered entries in registration order, or `None` when the
    /// registry has never been created (distinct from an empty sequence).
    pub fn list(&self) -> Option<Vec<TutorialEntry>> {
        self.raw()
            .map(|raw| raw.iter().filter_map(|s| Self::parse(s)).collect())
    }

    /// Distinct categories, in first-registration order.
    pub fn categories(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for entry in self.list().unwrap_or_default() {
            if !seen.contains(&entry.category) {
                seen.push(entry.category);
            }
        }
        seen
    }

    /// Tutorial names registered under `category`, in registration order.
    pub fn entries_for_category(&self, category: &str) -> Vec<String> {
        self.list()
            .unwrap_or_default()
            .into_iter()
            .filter(|e| e.category == category)
            .map(|e| e.name)
            .collect()
    }

    /// Resolve (name, category) to its source URI. The pair is unique, so
    /// more than one match signals registry corruption: that case is
    /// logged and the first match returned.
    pub fn uri_for(&self, name: &str, category: &str) -> Option<String> {
        let matches: Vec<TutorialEntry> = self
            .list()
            .unwrap_or_default()
            .into_iter()
            .filter(|e| e.matches(name, category))
            .collect();
        if matches.len() > 1 {
            warn!(
                "registry corruption: {} entries match (\"{name}\", \"{category}\"); using the first",
                matches.len()
            );
        }
        matches.into_iter().next().map(|e| e.source_uri)
    }
}
