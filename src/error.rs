//! Crate-wide error taxonomy.
//!
//! Registry and cache failures stay internal (callers log and move on);
//! only `ContentUnavailable` and `CommandDispatch` are meant to cross
//! into user-visible notifications.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A tutorial with the same (name, category) pair is already registered.
    /// Name comparison is case-insensitive; category comparison is not.
    #[error("tutorial \"{name}\" is already registered in category \"{category}\"")]
    DuplicateEntry { name: String, category: String },

    /// The tutorial source could not be read or rendered.
    #[error("content unavailable for {location}: {reason}")]
    ContentUnavailable { location: String, reason: String },

    /// Cache mirror could not be written. Logged only, never surfaced.
    #[error("cache write failed: {0}")]
    CacheWrite(String),

    /// Cache mirror could not be read. Logged only, never surfaced.
    #[error("cache read failed: {0}")]
    CacheRead(String),

    /// A clicked command link could not be parsed or dispatched.
    #[error("unable to run command link \"{link}\": {reason}")]
    CommandDispatch { link: String, reason: String },

    /// The persistent settings store rejected a read or write.
    #[error("settings store failure: {0}")]
    Settings(String),

    /// The host shell could not create or drive a webview panel.
    #[error("host panel failure: {0}")]
    Host(String),
}

impl Error {
    pub(crate) fn content_unavailable(location: impl Into<String>, reason: impl ToString) -> Self {
        Error::ContentUnavailable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn dispatch(link: impl Into<String>, reason: impl ToString) -> Self {
        Error::CommandDispatch {
            link: link.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_entry_names_both_halves_of_the_key() {
        let err = Error::DuplicateEntry {
            name: "Tut1".into(),
            category: "Cat1".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Tut1"));
        assert!(msg.contains("Cat1"));
    }

    #[test]
    fn content_unavailable_carries_location() {
        let err = Error::content_unavailable("https://example.com/t.md", "HTTP 404");
        assert!(err.to_string().contains("https://example.com/t.md"));
        assert!(err.to_string().contains("404"));
    }
}
