//! Singleton webview panel lifecycle.
//!
//! `PanelManager` owns the one live panel instance. A show request while a
//! panel exists disposes the old instance and constructs a new one: the
//! webview's local-resource-root allow-list is fixed at construction time
//! and must be recomputed from the new tutorial's directory. Stale async
//! resolutions are fenced off by a generation counter — only the newest
//! instance may be mutated, and wrapping after disposal is a guaranteed
//! no-op.

use parking_lot::Mutex;
use rand::Rng;
use rand::distr::Alphanumeric;
use regex::Regex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Weak};
use tracing::{debug, info, warn};

use crate::bridge::{CommandDispatcher, IncomingMessage, OutgoingMessage};
use crate::cache::ContentCache;
use crate::content::{ContentResolver, DocKind, SourceLocator};
use crate::error::Result;
use crate::host::{HostShell, PanelEvent, PanelEventSink, PanelHandle, PanelOptions, Subscription};
use crate::storage::SettingsStore;

const DEFAULT_TITLE: &str = "Guidebook Tutorial";
const OVERRIDE_STYLESHEET: &str = "webviewslim.css";
const WEBVIEW_SCRIPT: &str = "main.js";
const PANEL_ICON: &str = "logo.svg";

const ASCIIDOC_STYLESHEET: &str =
    "https://cdn.jsdelivr.net/gh/asciidoctor/asciidoctor@v2.0.10/data/stylesheets/asciidoctor-default.css";
const MARKDOWN_STYLESHEET: &str = "https://cdn.jsdelivr.net/npm/bulma@0.8.0/css/bulma.min.css";
const ICON_SCRIPT: &str = "https://use.fontawesome.com/releases/v5.3.1/js/all.js";

const VERSION_LABEL: &str = concat!("Guidebook ", env!("CARGO_PKG_VERSION"));

/// Read-only snapshot of the live panel.
#[derive(Debug, Clone)]
pub struct PanelView {
    pub title: String,
    pub source: Option<String>,
    pub is_asciidoc: bool,
    pub has_content: bool,
}

struct PanelInstance {
    handle: Box<dyn PanelHandle>,
    generation: u64,
    current_html: Option<String>,
    /// Raw pre-rendered override used by open-from-text flows.
    source_text: Option<String>,
    source_uri: Option<SourceLocator>,
    title: String,
    is_asciidoc: bool,
    disposed: bool,
    subscriptions: Vec<Subscription>,
}

/// Owning controller for the single live panel.
pub struct PanelManager {
    host: Arc<dyn HostShell>,
    resolver: Arc<dyn ContentResolver>,
    dispatcher: Arc<dyn CommandDispatcher>,
    cache: Arc<ContentCache>,
    settings: Arc<SettingsStore>,
    media_dir: PathBuf,
    icon_dir: PathBuf,
    slot: Mutex<Option<PanelInstance>>,
    generation: AtomicU64,
}

impl PanelManager {
    pub fn new(
        host: Arc<dyn HostShell>,
        resolver: Arc<dyn ContentResolver>,
        dispatcher: Arc<dyn CommandDispatcher>,
        cache: Arc<ContentCache>,
        settings: Arc<SettingsStore>,
        install_dir: &std::path::Path,
    ) -> Arc<Self> {
        Arc::new(Self {
            host,
            resolver,
            dispatcher,
            cache,
            settings,
            media_dir: install_dir.join("media"),
            icon_dir: install_dir.join("icon"),
            slot: Mutex::new(None),
            generation: AtomicU64::new(0),
        })
    }

    /// Snapshot of the live panel, if one exists.
    pub fn current(&self) -> Option<PanelView> {
        let slot = self.slot.lock();
        slot.as_ref().map(|instance| PanelView {
            title: instance.title.clone(),
            source: instance.source_uri.as_ref().map(|s| s.to_string()),
            is_asciidoc: instance.is_asciidoc,
            has_content: instance.current_html.is_some(),
        })
    }

    pub fn has_current(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Show a tutorial, replacing any live panel. Without a source the
    /// panel restores cached content first and falls back to the
    /// configured default tutorial.
    pub async fn show_or_replace(
        self: &Arc<Self>,
        source: Option<SourceLocator>,
        column_hint: Option<i32>,
    ) -> Result<()> {
        let column = match column_hint {
            Some(column) => {
                if let Err(e) = self.settings.set_last_column_used(column) {
                    warn!("could not persist last column: {e}");
                }
                Some(column)
            }
            None => self.settings.last_column_used(),
        };

        // Dispose first so the new panel's resource roots are recomputed.
        self.dispose_current();

        let mut resource_roots = vec![self.media_dir.clone(), self.icon_dir.clone()];
        if let Some(dir) = source.as_ref().and_then(SourceLocator::parent_dir) {
            resource_roots.push(dir);
        }

        let title = source
            .as_ref()
            .and_then(SourceLocator::file_name)
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let handle = self.host.create_panel(PanelOptions {
            title: title.clone(),
            column,
            resource_roots,
            enable_scripts: true,
            retain_when_hidden: true,
            icon: Some(self.icon_dir.join(PANEL_ICON)),
        })?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let sink = Arc::new(PanelEvents {
            manager: Arc::downgrade(self),
            generation,
        });
        let subscription = handle.subscribe(sink);

        let is_asciidoc = source
            .as_ref()
            .is_some_and(|s| s.doc_kind() == DocKind::AsciiDoc);
        let prefer_cache = source.is_none();

        *self.slot.lock() = Some(PanelInstance {
            handle,
            generation,
            current_html: None,
            source_text: None,
            source_uri: source,
            title,
            is_asciidoc,
            disposed: false,
            subscriptions: vec![subscription],
        });
        info!("tutorial panel shown (generation {generation})");

        self.update_content(generation, prefer_cache).await;
        Ok(())
    }

    /// Rebind a controller instance to a panel handle restored by the
    /// host's session-restore mechanism. The handle already carries its
    /// resource roots, so none are recomputed here.
    pub async fn revive(self: &Arc<Self>, handle: Box<dyn PanelHandle>) {
        self.dispose_current();

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let sink = Arc::new(PanelEvents {
            manager: Arc::downgrade(self),
            generation,
        });
        let subscription = handle.subscribe(sink);

        *self.slot.lock() = Some(PanelInstance {
            handle,
            generation,
            current_html: None,
            source_text: None,
            source_uri: None,
            title: DEFAULT_TITLE.to_string(),
            is_asciidoc: false,
            disposed: false,
            subscriptions: vec![subscription],
        });
        info!("tutorial panel revived (generation {generation})");

        self.update_content(generation, true).await;
    }

    /// Recover to a known-good state: drop any source-text override,
    /// re-read the configured default, and force a content reload.
    pub async fn hard_reset(&self) {
        let generation = {
            let mut slot = self.slot.lock();
            let Some(instance) = slot.as_mut() else {
                return;
            };
            instance.source_text = None;
            match self.default_locator() {
                Some(locator) => {
                    instance.is_asciidoc = locator.doc_kind() == DocKind::AsciiDoc;
                    instance.source_uri = Some(locator);
                }
                None => instance.source_uri = None,
            }
            instance.generation
        };
        self.update_content(generation, false).await;
    }

    /// Install a raw pre-rendered source override for the live panel.
    pub fn set_source_text(&self, text: Option<String>) {
        if let Some(instance) = self.slot.lock().as_mut() {
            instance.source_text = text;
        }
    }

    pub fn set_is_asciidoc(&self, flag: bool) {
        if let Some(instance) = self.slot.lock().as_mut() {
            instance.is_asciidoc = flag;
        }
    }

    /// Dispose the live panel, if any: flush the cache, release every
    /// subscription, drop the handle. Safe to call repeatedly.
    pub fn dispose_current(&self) {
        let instance = self.slot.lock().take();
        if let Some(instance) = instance {
            self.teardown(instance);
        }
    }

    fn teardown(&self, mut instance: PanelInstance) {
        if instance.disposed {
            return;
        }
        instance.disposed = true;
        if let Some(html) = &instance.current_html {
            let uri = instance
                .source_uri
                .as_ref()
                .map(|s| s.to_string())
                .unwrap_or_default();
            self.cache.flush(html, &instance.title, &uri);
        }
        for subscription in &mut instance.subscriptions {
            subscription.release();
        }
        instance.handle.dispose();
        debug!("tutorial panel disposed (generation {})", instance.generation);
    }

    // Host told us the user closed the panel. Stale events from an
    // already-replaced instance are ignored.
    fn on_host_dispose(&self, generation: u64) {
        let instance = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some(instance) if instance.generation == generation => slot.take(),
                _ => None,
            }
        };
        if let Some(instance) = instance {
            self.teardown(instance);
        }
    }

    /// Mirror the live content into the on-disk cache.
    pub fn flush_cache(&self) {
        let snapshot = {
            let slot = self.slot.lock();
            slot.as_ref().and_then(|instance| {
                instance.current_html.as_ref().map(|html| {
                    (
                        html.clone(),
                        instance.title.clone(),
                        instance
                            .source_uri
                            .as_ref()
                            .map(|s| s.to_string())
                            .unwrap_or_default(),
                    )
                })
            })
        };
        if let Some((html, title, uri)) = snapshot {
            self.cache.flush(&html, &title, &uri);
        }
    }

    fn default_locator(&self) -> Option<SourceLocator> {
        let configured = self.settings.default_url()?;
        match SourceLocator::parse(&configured) {
            Ok(locator) => Some(locator),
            Err(e) => {
                warn!("configured default tutorial is unusable: {e}");
                None
            }
        }
    }

    // Resolve and apply content for `generation`. With `prefer_cache` the
    // on-disk mirror wins over re-resolving the source.
    async fn update_content(&self, generation: u64, prefer_cache: bool) {
        if prefer_cache && self.restore_from_cache(generation) {
            return;
        }

        let (override_text, source) = {
            let slot = self.slot.lock();
            match slot.as_ref() {
                Some(instance) if instance.generation == generation && !instance.disposed => {
                    (instance.source_text.clone(), instance.source_uri.clone())
                }
                _ => return,
            }
        };

        if let Some(text) = override_text {
            self.apply_content(generation, &text);
            return;
        }

        let locator = match source.or_else(|| self.default_locator()) {
            Some(locator) => locator,
            None => {
                warn!("no tutorial source and no configured default; panel left empty");
                return;
            }
        };

        {
            let mut slot = self.slot.lock();
            match slot.as_mut() {
                Some(instance) if instance.generation == generation && !instance.disposed => {
                    instance.is_asciidoc = locator.doc_kind() == DocKind::AsciiDoc;
                    instance.source_uri = Some(locator.clone());
                }
                _ => return,
            }
        }

        match self.resolver.resolve(&locator).await {
            Ok(body) => self.apply_content(generation, &body),
            Err(e) => {
                warn!("{e}");
                // keep whatever the panel already shows
                self.host.notify_error(&e.to_string());
            }
        }
    }

    // Restore wrapped HTML from the cache. Returns true when this
    // resolution attempt is finished (restored, or fenced off as stale).
    fn restore_from_cache(&self, generation: u64) -> bool {
        let Some(html) = self.cache.read_html() else {
            return false;
        };
        let title = self.cache.read_title();
        let uri = self.cache.read_uri();

        let mut slot = self.slot.lock();
        let Some(instance) = slot.as_mut() else {
            return true;
        };
        if instance.generation != generation || instance.disposed {
            return true;
        }

        instance.current_html = Some(html.clone());
        if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
            instance.title = title;
        }
        if instance.source_uri.is_none()
            && let Some(uri) = uri
        {
            instance.source_uri = SourceLocator::parse(&uri).ok();
        }
        instance.handle.set_html(&html);
        instance.handle.set_title(&instance.title);
        debug!("restored tutorial content from cache");
        true
    }

    // Wrap a resolved body and push it into the webview. Drops the update
    // silently when the target generation is no longer live.
    fn apply_content(&self, generation: u64, body: &str) {
        let flushed = {
            let mut slot = self.slot.lock();
            let Some(instance) = slot.as_mut() else {
                return;
            };
            if instance.generation != generation || instance.disposed {
                debug!("dropping stale content for generation {generation}");
                return;
            }
            let Some(wrapped) = wrap_with(instance, body, &self.media_dir) else {
                return;
            };
            instance.current_html = Some(wrapped.clone());
            if let Some(heading) = first_heading_text(&wrapped) {
                instance.title = heading;
            }
            instance.handle.set_html(&wrapped);
            instance.handle.set_title(&instance.title);
            (
                wrapped,
                instance.title.clone(),
                instance
                    .source_uri
                    .as_ref()
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
            )
        };
        self.cache.flush(&flushed.0, &flushed.1, &flushed.2);
    }

    /// Wrap raw rendered HTML in the full document envelope for the live
    /// panel. Returns `None` when there is no live instance, the instance
    /// is disposed, or the content is empty — cleanup may race with an
    /// in-flight resolution, and wrapping after disposal must not happen.
    pub fn wrap_content(&self, body: &str) -> Option<String> {
        let slot = self.slot.lock();
        let instance = slot.as_ref()?;
        if instance.disposed {
            return None;
        }
        wrap_with(instance, body, &self.media_dir)
    }

    // -- outgoing messages --

    fn post(&self, message: OutgoingMessage) -> Result<()> {
        let slot = self.slot.lock();
        let Some(instance) = slot.as_ref() else {
            // no live panel: nothing to deliver, and that is fine
            return Ok(());
        };
        let encoded = message.encode();
        debug!("posting webview message: {encoded}");
        instance.handle.post_message(&encoded)
    }

    pub fn post_message(&self, data: &str) -> Result<()> {
        self.post(OutgoingMessage::SendMessage {
            data: data.to_string(),
        })
    }

    pub fn post_requirement_result(&self, requirement_name: &str, result: bool) -> Result<()> {
        self.post(OutgoingMessage::RequirementCheck {
            requirement_name: requirement_name.to_string(),
            result,
        })
    }

    pub fn request_all_requirement_checks(&self) -> Result<()> {
        self.post(OutgoingMessage::AllRequirementCheck)
    }

    pub fn request_requirement_links(&self) -> Result<()> {
        self.post(OutgoingMessage::ReturnRequirements)
    }

    pub fn request_command_links(&self) -> Result<()> {
        self.post(OutgoingMessage::ReturnCommands)
    }

    // -- incoming messages --

    /// Handle a message reported by the webview. Dispatch failures are
    /// surfaced as user-visible errors; the bridge stays usable.
    pub fn handle_incoming(&self, json: &str) {
        match IncomingMessage::decode(json) {
            Ok(IncomingMessage::Update { text: Some(text) }) => {
                let mut slot = self.slot.lock();
                if let Some(instance) = slot.as_mut()
                    && !instance.disposed
                {
                    instance.current_html = Some(text);
                }
            }
            Ok(IncomingMessage::Link { text: Some(link) }) => {
                if let Err(e) = self.dispatcher.dispatch(&link) {
                    warn!("{e}");
                    self.host.notify_error(&e.to_string());
                }
            }
            Ok(_) => {}
            Err(e) => warn!("unreadable webview message {json:?}: {e}"),
        }
    }
}

// Event sink bound to one panel generation. A weak manager reference
// keeps stale sinks from prolonging the controller's life.
struct PanelEvents {
    manager: Weak<PanelManager>,
    generation: u64,
}

impl PanelEventSink for PanelEvents {
    fn on_event(&self, event: PanelEvent) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        match event {
            PanelEvent::VisibilityChanged { visible: false } => manager.flush_cache(),
            PanelEvent::VisibilityChanged { visible: true } => {
                // the tutorial may have changed on disk while hidden
                let generation = self.generation;
                tokio::spawn(async move {
                    manager.update_content(generation, false).await;
                });
            }
            PanelEvent::HostDisposed => manager.on_host_dispose(self.generation),
            PanelEvent::Message(json) => manager.handle_incoming(&json),
        }
    }
}

/// 32 characters drawn uniformly from `[A-Za-z0-9]`.
fn nonce() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("valid regex"));
static H2_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h2[^>]*>(.*?)</h2>").expect("valid regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

/// First `<h1>` text, else first `<h2>` text, trimmed; `None` when neither
/// yields non-empty text.
fn first_heading_text(html: &str) -> Option<String> {
    for re in [&H1_RE, &H2_RE] {
        if let Some(captures) = re.captures(html) {
            let text = TAG_RE.replace_all(&captures[1], "").trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn wrap_with(instance: &PanelInstance, body: &str, media_dir: &std::path::Path) -> Option<String> {
    if body.is_empty() || instance.disposed {
        return None;
    }

    let nonce = nonce();
    let csp = instance.handle.csp_source();

    let base_tag = instance
        .source_uri
        .as_ref()
        .and_then(SourceLocator::parent_dir)
        .map(|dir| {
            let mut base = instance.handle.webview_uri(&dir);
            if !base.ends_with('/') {
                base.push('/');
            }
            format!("<base href=\"{base}\"/>")
        })
        .unwrap_or_default();

    let override_css = instance.handle.webview_uri(&media_dir.join(OVERRIDE_STYLESHEET));
    let script_uri = instance.handle.webview_uri(&media_dir.join(WEBVIEW_SCRIPT));
    let primary_css = if instance.is_asciidoc {
        ASCIIDOC_STYLESHEET
    } else {
        MARKDOWN_STYLESHEET
    };

    Some(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8"/>
<meta name="viewport" content="width=device-width, initial-scale=1.0"/>
<meta http-equiv="Content-Security-Policy" content="default-src 'none'; img-src 'self' data: https: http: blob: {csp}; media-src {csp} https: data:; script-src 'nonce-{nonce}' https:; style-src 'unsafe-inline' {csp} https: data:; font-src {csp} https: data:; object-src 'none';"/>
{base_tag}
<title>{DEFAULT_TITLE}</title>
<link rel="stylesheet" href="{primary_css}"/>
<link rel="stylesheet" href="{override_css}"/>
<script defer="true" src="{ICON_SCRIPT}"></script>
</head>
<body class="content">
<div class="tutorialContent">
{body}
</div>
<div class="tutorialFooter">{VERSION_LABEL}</div>
<script nonce="{nonce}" src="{script_uri}"></script>
</body>
</html>"#
    ))
}
