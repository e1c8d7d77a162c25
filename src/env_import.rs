//! One-shot tutorial import from the environment.
//!
//! `GUIDEBOOK_APPEND_TUTORIALS` may hold a JSON array of tutorial entries
//! whose `sourceUri` values are percent-encoded. The import runs once at
//! startup, after the bundled defaults are registered, so the environment
//! can only add tutorials — a collision with an existing (name, category)
//! pair is rejected, logged, and skipped; it never aborts the rest of the
//! import.

use percent_encoding::percent_decode_str;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::registry::{TutorialEntry, TutorialRegistry};

/// Environment variable holding the JSON-encoded tutorial list.
pub const APPEND_TUTORIALS_ENV: &str = "GUIDEBOOK_APPEND_TUTORIALS";

/// Parse the environment variable, if present. Malformed JSON is logged
/// and treated as absent.
pub fn appended_tutorials_from_env() -> Option<Vec<TutorialEntry>> {
    let raw = std::env::var(APPEND_TUTORIALS_ENV).ok()?;
    match serde_json::from_str::<Vec<TutorialEntry>>(&raw) {
        Ok(entries) => Some(entries),
        Err(e) => {
            warn!("{APPEND_TUTORIALS_ENV} does not hold a valid tutorial list: {e}");
            None
        }
    }
}

fn decode_source_uri(entry: &TutorialEntry) -> String {
    match percent_decode_str(&entry.source_uri).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            warn!(
                "sourceUri for \"{}\" does not decode cleanly ({e}); keeping it as-is",
                entry.name
            );
            entry.source_uri.clone()
        }
    }
}

/// Register every tutorial named by the environment variable. Returns the
/// number of entries actually added. Each entry registers atomically;
/// collisions and storage faults are logged per entry and skipped.
pub fn append_tutorials_from_env(registry: &TutorialRegistry) -> usize {
    let Some(entries) = appended_tutorials_from_env() else {
        return 0;
    };

    let mut added = 0;
    for entry in &entries {
        let source_uri = decode_source_uri(entry);
        match registry.register(&entry.name, &source_uri, &entry.category) {
            Ok(()) => added += 1,
            Err(Error::DuplicateEntry { name, category }) => {
                debug!("environment tutorial \"{name}\" already registered in \"{category}\"; skipping");
            }
            Err(e) => {
                warn!("could not register environment tutorial \"{}\": {e}", entry.name);
            }
        }
    }
    info!("environment import added {added} of {} tutorials", entries.len());
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SettingsStore;
    use serial_test::serial;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> TutorialRegistry {
        TutorialRegistry::new(Arc::new(SettingsStore::open(dir.path())))
    }

    // set_var/remove_var require exclusive env access; #[serial] provides it.
    fn set_env(value: &str) {
        unsafe { std::env::set_var(APPEND_TUTORIALS_ENV, value) };
    }

    fn clear_env() {
        unsafe { std::env::remove_var(APPEND_TUTORIALS_ENV) };
    }

    #[test]
    #[serial]
    fn absent_variable_imports_nothing() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        assert_eq!(append_tutorials_from_env(&reg), 0);
        assert!(reg.list().is_none());
    }

    #[test]
    #[serial]
    fn imports_entries_and_decodes_percent_encoding() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        set_env(
            r#"[{"name":"AppendMe","category":"AppendedCat","sourceUri":"https%3A%2F%2Fexample.com%2Fregistry.md"}]"#,
        );
        let added = append_tutorials_from_env(&reg);
        clear_env();

        assert_eq!(added, 1);
        assert_eq!(
            reg.uri_for("AppendMe", "AppendedCat").as_deref(),
            Some("https://example.com/registry.md")
        );
    }

    #[test]
    #[serial]
    fn collisions_are_skipped_without_aborting_the_import() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        reg.register("Existing", "uri-0", "Cat").unwrap();

        set_env(
            r#"[
                {"name":"Existing","category":"Cat","sourceUri":"uri-overridden"},
                {"name":"Fresh","category":"Cat","sourceUri":"uri-1"},
                {"name":"existing","category":"Cat","sourceUri":"uri-2"},
                {"name":"Another","category":"Cat2","sourceUri":"uri-3"}
            ]"#,
        );
        let added = append_tutorials_from_env(&reg);
        clear_env();

        // N = 4 entries, M = 2 collide (case-insensitive name match)
        assert_eq!(added, 2);
        // collisions never override the existing entry
        assert_eq!(reg.uri_for("Existing", "Cat").as_deref(), Some("uri-0"));
        assert_eq!(reg.uri_for("Fresh", "Cat").as_deref(), Some("uri-1"));
        assert_eq!(reg.uri_for("Another", "Cat2").as_deref(), Some("uri-3"));
    }

    #[test]
    #[serial]
    fn malformed_json_is_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        set_env("this is not json");
        assert_eq!(append_tutorials_from_env(&reg), 0);
        clear_env();
        assert!(reg.list().is_none());
    }
}
