//! On-disk mirror of the panel's last-rendered content.
//!
//! Three sibling files under `<globalStorage>/guidebook/cache/` hold the
//! wrapped HTML, the display title, and the source locator string. They
//! are written together on every refresh; a reader tolerates any subset
//! being absent (a partial cache is a miss for that field only). Caching
//! is an optimization: I/O failures are logged and swallowed, never
//! propagated.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Error;

const CACHE_SUBDIR: &str = "guidebook/cache";
const HTML_FILE: &str = "currentHtml.html";
const TITLE_FILE: &str = "currentTitle.txt";
const URI_FILE: &str = "currentUri.txt";

pub struct ContentCache {
    dir: PathBuf,
}

impl ContentCache {
    /// Cache rooted under the host's global storage directory.
    pub fn new(global_storage_dir: &Path) -> Self {
        Self {
            dir: global_storage_dir.join(CACHE_SUBDIR),
        }
    }

    /// Write all three cache files, creating the directory if needed.
    /// Never fails: a write error is logged and the cache simply stays
    /// stale or partial.
    pub fn flush(&self, html: &str, title: &str, uri: &str) {
        if let Err(e) = self.try_flush(html, title, uri) {
            warn!("{e}");
        } else {
            debug!("tutorial content cached to {}", self.dir.display());
        }
    }

    fn try_flush(&self, html: &str, title: &str, uri: &str) -> Result<(), Error> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::CacheWrite(format!("cannot create {}: {e}", self.dir.display()))
        })?;
        for (file, contents) in [(HTML_FILE, html), (TITLE_FILE, title), (URI_FILE, uri)] {
            let path = self.dir.join(file);
            std::fs::write(&path, contents)
                .map_err(|e| Error::CacheWrite(format!("cannot write {}: {e}", path.display())))?;
        }
        Ok(())
    }

    fn read(&self, file: &str) -> Option<String> {
        let path = self.dir.join(file);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("{}", Error::CacheRead(format!("{}: {e}", path.display())));
                None
            }
        }
    }

    pub fn read_html(&self) -> Option<String> {
        self.read(HTML_FILE)
    }

    pub fn read_title(&self) -> Option<String> {
        self.read(TITLE_FILE)
    }

    pub fn read_uri(&self) -> Option<String> {
        self.read(URI_FILE)
    }
}
