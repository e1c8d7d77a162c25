//! Host-editor collaborator seams.
//!
//! The embedding host owns the real webview surface, the notification
//! toasts, and the event loop. Everything the crate needs from it sits
//! behind these traits so the lifecycle logic can be driven (and tested)
//! without a live editor.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;

/// Construction-time panel parameters. The resource roots are immutable
/// for the lifetime of the created panel; recomputing them requires a
/// brand-new panel.
#[derive(Debug, Clone)]
pub struct PanelOptions {
    pub title: String,
    pub column: Option<i32>,
    pub resource_roots: Vec<PathBuf>,
    pub enable_scripts: bool,
    pub retain_when_hidden: bool,
    pub icon: Option<PathBuf>,
}

/// Lifecycle events the host delivers for a live panel.
#[derive(Debug, Clone)]
pub enum PanelEvent {
    VisibilityChanged { visible: bool },
    HostDisposed,
    Message(String),
}

/// Receiver for panel events; implemented by the lifecycle manager.
pub trait PanelEventSink: Send + Sync {
    fn on_event(&self, event: PanelEvent);
}

/// A live webview panel handle.
pub trait PanelHandle: Send + Sync {
    fn set_html(&self, html: &str);
    fn set_title(&self, title: &str);
    fn post_message(&self, json: &str) -> Result<()>;
    /// The webview origin usable inside a content-security-policy header.
    fn csp_source(&self) -> String;
    /// Map a local path into a URI loadable from inside the webview.
    fn webview_uri(&self, path: &Path) -> String;
    /// Register an event sink. The returned subscription must be released
    /// when the panel controller lets go of the handle.
    fn subscribe(&self, sink: Arc<dyn PanelEventSink>) -> Subscription;
    fn dispose(&self);
}

/// The host shell: panel factory plus user-visible notifications.
pub trait HostShell: Send + Sync {
    fn create_panel(&self, options: PanelOptions) -> Result<Box<dyn PanelHandle>>;
    fn notify_error(&self, message: &str);
}

/// A releasable event registration. Releasing twice is a no-op; dropping
/// an unreleased subscription releases it.
pub struct Subscription(Option<Box<dyn FnOnce() + Send>>);

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(release)))
    }

    pub fn noop() -> Self {
        Self(None)
    }

    pub fn release(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

// ---------------------------------------------------------------------------
// Test fakes
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use crate::error::Error;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub(crate) struct FakePanelState {
        pub html: Option<String>,
        pub title: Option<String>,
        pub messages: Vec<String>,
        pub disposed: bool,
        pub sinks: Vec<Arc<dyn PanelEventSink>>,
        pub released_subscriptions: usize,
    }

    /// In-memory panel capturing everything the controller does to it.
    #[derive(Clone, Default)]
    pub(crate) struct FakePanel {
        pub state: Arc<Mutex<FakePanelState>>,
    }

    impl FakePanel {
        /// Deliver a host event to every registered sink.
        pub fn emit(&self, event: PanelEvent) {
            let sinks: Vec<_> = self.state.lock().sinks.clone();
            for sink in sinks {
                sink.on_event(event.clone());
            }
        }
    }

    impl PanelHandle for FakePanel {
        fn set_html(&self, html: &str) {
            self.state.lock().html = Some(html.to_string());
        }

        fn set_title(&self, title: &str) {
            self.state.lock().title = Some(title.to_string());
        }

        fn post_message(&self, json: &str) -> Result<()> {
            let mut state = self.state.lock();
            if state.disposed {
                return Err(Error::Host("panel is disposed".into()));
            }
            state.messages.push(json.to_string());
            Ok(())
        }

        fn csp_source(&self) -> String {
            "webview://local".to_string()
        }

        fn webview_uri(&self, path: &Path) -> String {
            format!("webview://local{}", path.display())
        }

        fn subscribe(&self, sink: Arc<dyn PanelEventSink>) -> Subscription {
            self.state.lock().sinks.push(sink);
            let state = self.state.clone();
            Subscription::new(move || {
                state.lock().released_subscriptions += 1;
            })
        }

        fn dispose(&self) {
            self.state.lock().disposed = true;
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeShellState {
        pub panels: Vec<FakePanel>,
        pub options: Vec<PanelOptions>,
        pub errors: Vec<String>,
    }

    /// Host shell that hands out `FakePanel`s and records notifications.
    #[derive(Clone, Default)]
    pub(crate) struct FakeShell {
        pub state: Arc<Mutex<FakeShellState>>,
    }

    impl FakeShell {
        pub fn last_panel(&self) -> FakePanel {
            self.state.lock().panels.last().expect("no panel created").clone()
        }

        pub fn panel_count(&self) -> usize {
            self.state.lock().panels.len()
        }

        pub fn errors(&self) -> Vec<String> {
            self.state.lock().errors.clone()
        }
    }

    impl HostShell for FakeShell {
        fn create_panel(&self, options: PanelOptions) -> Result<Box<dyn PanelHandle>> {
            let panel = FakePanel::default();
            let mut state = self.state.lock();
            state.panels.push(panel.clone());
            state.options.push(options);
            Ok(Box::new(panel))
        }

        fn notify_error(&self, message: &str) {
            self.state.lock().errors.push(message.to_string());
        }
    }
}
