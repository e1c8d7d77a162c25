//! Tutorial source resolution: locator parsing, fetching, rendering.
//!
//! A `SourceLocator` names where a tutorial lives (local file or http/https
//! URL). The `ContentResolver` collaborator turns a locator into rendered
//! HTML; the bundled `FileHttpResolver` reads files through tokio and URLs
//! through reqwest, then hands the raw text to a `Renderer`. Markdown
//! rendering is delegated to pulldown-cmark; AsciiDoc rendering is a
//! pluggable seam for the embedding host.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

/// Request timeout for remote tutorial fetches.
const FETCH_TIMEOUT_SECS: u64 = 30;

/// Document flavor, decided by the source extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    Markdown,
    AsciiDoc,
}

impl DocKind {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("adoc") => DocKind::AsciiDoc,
            _ => DocKind::Markdown,
        }
    }
}

/// Where a tutorial's source lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    File(PathBuf),
    Remote(Url),
}

impl SourceLocator {
    /// Parse a locator string: `http(s)://` URLs stay remote, `file://`
    /// URLs and bare paths become file locators.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::content_unavailable(input, "empty source locator"));
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            let url = Url::parse(trimmed)
                .map_err(|e| Error::content_unavailable(trimmed, format!("invalid URL: {e}")))?;
            return Ok(SourceLocator::Remote(url));
        }
        if let Some(rest) = trimmed.strip_prefix("file://") {
            return Ok(SourceLocator::File(PathBuf::from(rest)));
        }
        Ok(SourceLocator::File(PathBuf::from(trimmed)))
    }

    pub fn doc_kind(&self) -> DocKind {
        match self {
            SourceLocator::File(path) => DocKind::from_path(path),
            SourceLocator::Remote(url) => DocKind::from_path(Path::new(url.path())),
        }
    }

    /// Directory containing a file locator; remote sources have none.
    pub fn parent_dir(&self) -> Option<PathBuf> {
        match self {
            SourceLocator::File(path) => path.parent().map(Path::to_path_buf),
            SourceLocator::Remote(_) => None,
        }
    }

    /// Final path segment, used as the panel's fallback title.
    pub fn file_name(&self) -> Option<String> {
        match self {
            SourceLocator::File(path) => {
                path.file_name().map(|n| n.to_string_lossy().into_owned())
            }
            SourceLocator::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::File(path) => write!(f, "{}", path.display()),
            SourceLocator::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// Rendering engine seam. The crate ships a CommonMark implementation;
/// hosts that need AsciiDoc plug their own renderer in here.
pub trait Renderer: Send + Sync {
    fn render(&self, source: &str, kind: DocKind) -> Result<String>;
}

/// Markdown renderer backed by pulldown-cmark.
#[derive(Default)]
pub struct CommonMarkRenderer;

impl Renderer for CommonMarkRenderer {
    fn render(&self, source: &str, kind: DocKind) -> Result<String> {
        match kind {
            DocKind::Markdown => {
                let options = pulldown_cmark::Options::ENABLE_TABLES
                    | pulldown_cmark::Options::ENABLE_STRIKETHROUGH
                    | pulldown_cmark::Options::ENABLE_TASKLISTS;
                let parser = pulldown_cmark::Parser::new_ext(source, options);
                let mut html = String::with_capacity(source.len() * 2);
                pulldown_cmark::html::push_html(&mut html, parser);
                Ok(html)
            }
            DocKind::AsciiDoc => Err(Error::content_unavailable(
                "AsciiDoc document",
                "no AsciiDoc renderer configured",
            )),
        }
    }
}

/// Content resolution collaborator: locator in, rendered HTML out.
#[async_trait]
pub trait ContentResolver: Send + Sync {
    async fn resolve(&self, locator: &SourceLocator) -> Result<String>;
}

/// Default resolver: local files via tokio, remote sources via reqwest.
pub struct FileHttpResolver {
    renderer: Arc<dyn Renderer>,
    client: reqwest::Client,
}

impl FileHttpResolver {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self { renderer, client }
    }

    async fn fetch_remote(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::content_unavailable(url.as_str(), e))?;
        if !response.status().is_success() {
            return Err(Error::content_unavailable(
                url.as_str(),
                format!("HTTP {}", response.status()),
            ));
        }
        response
            .text()
            .await
            .map_err(|e| Error::content_unavailable(url.as_str(), e))
    }
}

#[async_trait]
impl ContentResolver for FileHttpResolver {
    async fn resolve(&self, locator: &SourceLocator) -> Result<String> {
        let raw = match locator {
            SourceLocator::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| Error::content_unavailable(path.display().to_string(), e))?,
            SourceLocator::Remote(url) => self.fetch_remote(url).await?,
        };
        self.renderer.render(&raw, locator.doc_kind())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver() -> FileHttpResolver {
        FileHttpResolver::new(Arc::new(CommonMarkRenderer))
    }

    // -- locator parsing --

    #[test]
    fn parse_recognizes_http_and_https() {
        assert!(matches!(
            SourceLocator::parse("https://example.com/t.md").unwrap(),
            SourceLocator::Remote(_)
        ));
        assert!(matches!(
            SourceLocator::parse("http://example.com/t.md").unwrap(),
            SourceLocator::Remote(_)
        ));
    }

    #[test]
    fn parse_treats_bare_and_file_scheme_paths_as_files() {
        assert_eq!(
            SourceLocator::parse("/tmp/tutorial.md").unwrap(),
            SourceLocator::File(PathBuf::from("/tmp/tutorial.md"))
        );
        assert_eq!(
            SourceLocator::parse("file:///tmp/tutorial.md").unwrap(),
            SourceLocator::File(PathBuf::from("/tmp/tutorial.md"))
        );
    }

    #[test]
    fn parse_rejects_empty_input() {
        assert!(SourceLocator::parse("   ").is_err());
    }

    #[test]
    fn doc_kind_follows_extension() {
        assert_eq!(
            SourceLocator::parse("/a/b/t.adoc").unwrap().doc_kind(),
            DocKind::AsciiDoc
        );
        assert_eq!(
            SourceLocator::parse("/a/b/t.md").unwrap().doc_kind(),
            DocKind::Markdown
        );
        assert_eq!(
            SourceLocator::parse("https://x.test/doc.adoc").unwrap().doc_kind(),
            DocKind::AsciiDoc
        );
    }

    #[test]
    fn parent_dir_and_file_name() {
        let loc = SourceLocator::parse("/a/b/t.md").unwrap();
        assert_eq!(loc.parent_dir(), Some(PathBuf::from("/a/b")));
        assert_eq!(loc.file_name().as_deref(), Some("t.md"));

        let remote = SourceLocator::parse("https://x.test/docs/t.md").unwrap();
        assert_eq!(remote.parent_dir(), None);
        assert_eq!(remote.file_name().as_deref(), Some("t.md"));
    }

    // -- rendering --

    #[test]
    fn markdown_renders_to_html() {
        let html = CommonMarkRenderer
            .render("# Title\n\nSome *text*.", DocKind::Markdown)
            .unwrap();
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>text</em>"));
    }

    #[test]
    fn asciidoc_without_renderer_is_unavailable() {
        let err = CommonMarkRenderer
            .render("= Title", DocKind::AsciiDoc)
            .unwrap_err();
        assert!(matches!(err, Error::ContentUnavailable { .. }));
    }

    // -- resolution --

    #[tokio::test]
    async fn resolves_a_local_markdown_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.md");
        std::fs::write(&path, "## Hello\n").unwrap();

        let html = resolver().resolve(&SourceLocator::File(path)).await.unwrap();
        assert!(html.contains("<h2>Hello</h2>"));
    }

    #[tokio::test]
    async fn missing_file_is_content_unavailable() {
        let err = resolver()
            .resolve(&SourceLocator::File(PathBuf::from("/no/such/file.md")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ContentUnavailable { .. }));
    }

    #[tokio::test]
    async fn resolves_a_remote_markdown_document() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tutorial.md")
            .with_status(200)
            .with_body("# Remote\n")
            .create_async()
            .await;

        let locator = SourceLocator::parse(&format!("{}/tutorial.md", server.url())).unwrap();
        let html = resolver().resolve(&locator).await.unwrap();
        assert!(html.contains("<h1>Remote</h1>"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn remote_error_status_is_content_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/gone.md")
            .with_status(404)
            .create_async()
            .await;

        let locator = SourceLocator::parse(&format!("{}/gone.md", server.url())).unwrap();
        let err = resolver().resolve(&locator).await.unwrap_err();
        match err {
            Error::ContentUnavailable { reason, .. } => assert!(reason.contains("404")),
            other => panic!("expected ContentUnavailable, got {other}"),
        }
    }
}
