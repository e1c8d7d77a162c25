//! guidebook — interactive tutorial panels for editor-embedded webviews.
//!
//! The crate owns the tutorial registry (a persisted catalog of named,
//! categorized tutorial sources), the singleton panel lifecycle with its
//! on-disk content cache, and the JSON message bridge between the panel
//! and its embedded content. The editor surface itself (webview windows,
//! notifications, tree views) is supplied by the embedding host through
//! the traits in [`host`].

pub mod bridge;
pub mod cache;
pub mod commands;
pub mod content;
pub mod env_import;
pub mod error;
pub mod host;
pub mod logging;
pub mod panel;
pub mod registry;
pub mod requirements;
pub mod storage;

pub use bridge::{CommandDispatcher, IncomingMessage, OutgoingMessage};
pub use cache::ContentCache;
pub use commands::{CommandRequest, CommandTable, parse_command_link};
pub use content::{
    CommonMarkRenderer, ContentResolver, DocKind, FileHttpResolver, Renderer, SourceLocator,
};
pub use error::{Error, Result};
pub use host::{HostShell, PanelHandle, PanelOptions, Subscription};
pub use panel::{PanelManager, PanelView};
pub use registry::{TutorialEntry, TutorialRegistry};
pub use storage::{SettingsStore, StoragePaths};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::commands::CommandRequest as Request;

/// Category the bundled tutorials are registered under.
pub const DEFAULT_TUTORIAL_CATEGORY: &str = "Guidebook";
/// Name of the bundled demo tutorial.
pub const DEFAULT_TUTORIAL_NAME: &str = "Guidebook Demo";

// Bundled tutorials, relative to the install directory.
const DEFAULT_TUTORIALS: &[(&str, &str)] = &[
    (DEFAULT_TUTORIAL_NAME, "demos/welcome.md"),
    ("Writing Your First Tutorial", "demos/writing-tutorials.md"),
];

/// Filesystem roots the workbench needs: where the crate's bundled assets
/// live and where persistent state goes.
#[derive(Debug, Clone)]
pub struct WorkbenchPaths {
    /// Directory containing `media/`, `icon/`, and `demos/`.
    pub install_dir: PathBuf,
    pub storage: StoragePaths,
}

impl WorkbenchPaths {
    pub fn discover(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            storage: StoragePaths::discover(),
        }
    }

    /// Everything under one directory. Used by tests and embedded setups.
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            install_dir: dir.to_path_buf(),
            storage: StoragePaths::rooted_at(dir),
        }
    }
}

/// The assembled service graph: settings, registry, cache, panel
/// controller, and command table, constructed once at startup and shared
/// by reference.
pub struct Workbench {
    settings: Arc<SettingsStore>,
    registry: Arc<TutorialRegistry>,
    cache: Arc<ContentCache>,
    panels: Arc<PanelManager>,
    commands: Arc<CommandTable>,
    install_dir: PathBuf,
}

impl Workbench {
    pub fn new(
        host: Arc<dyn HostShell>,
        resolver: Arc<dyn ContentResolver>,
        paths: WorkbenchPaths,
    ) -> Arc<Self> {
        let settings = Arc::new(SettingsStore::open(&paths.storage.settings_dir));
        let registry = Arc::new(TutorialRegistry::new(settings.clone()));
        let cache = Arc::new(ContentCache::new(&paths.storage.global_storage_dir));
        let commands = Arc::new(CommandTable::new());
        let panels = PanelManager::new(
            host,
            resolver,
            commands.clone(),
            cache.clone(),
            settings.clone(),
            &paths.install_dir,
        );

        let workbench = Arc::new(Self {
            settings,
            registry,
            cache,
            panels,
            commands,
            install_dir: paths.install_dir,
        });
        workbench.register_builtin_commands();
        workbench
    }

    /// Startup sequence: bundled defaults first, then the environment
    /// import (so the environment can add but never override a default),
    /// then the optional startup panel.
    pub async fn startup(self: &Arc<Self>) -> Result<()> {
        if self.settings.auto_install_default_tutorials() {
            self.install_default_tutorials();
        }
        env_import::append_tutorials_from_env(&self.registry);
        if self.settings.open_at_startup() {
            self.panels.show_or_replace(None, None).await?;
        }
        Ok(())
    }

    /// Dispose the live panel and mirror its content to disk.
    pub fn shutdown(&self) {
        self.panels.dispose_current();
    }

    // Startup registration runs on every launch, so collisions with the
    // already-persisted defaults are expected and skipped.
    fn install_default_tutorials(&self) {
        for (name, relative_path) in DEFAULT_TUTORIALS {
            let path = self.install_dir.join(relative_path);
            match self
                .registry
                .register(name, &path.to_string_lossy(), DEFAULT_TUTORIAL_CATEGORY)
            {
                Ok(()) => {}
                Err(Error::DuplicateEntry { .. }) => {
                    debug!("default tutorial \"{name}\" already registered");
                }
                Err(e) => warn!("could not register default tutorial \"{name}\": {e}"),
            }
        }
    }

    /// Open a registered tutorial by its (name, category) pair.
    pub async fn open_tutorial(self: &Arc<Self>, name: &str, category: &str) -> Result<()> {
        let Some(uri) = self.registry.uri_for(name, category) else {
            return Err(Error::ContentUnavailable {
                location: format!("{category}/{name}"),
                reason: "tutorial is not registered".to_string(),
            });
        };
        let locator = SourceLocator::parse(&uri)?;
        self.panels.show_or_replace(Some(locator), None).await
    }

    fn register_builtin_commands(self: &Arc<Self>) {
        let registry = self.registry.clone();
        self.commands
            .register(commands::REGISTER_TUTORIAL_COMMAND, move |req| {
                registry.register(
                    required_arg(req, "name")?,
                    required_arg(req, "uri")?,
                    required_arg(req, "category")?,
                )
            });

        let registry = self.registry.clone();
        self.commands
            .register(commands::REMOVE_TUTORIAL_COMMAND, move |req| {
                registry.remove(required_arg(req, "name")?, required_arg(req, "category")?)
            });

        let registry = self.registry.clone();
        self.commands
            .register(commands::CLEAR_REGISTRY_COMMAND, move |_req| {
                registry.clear(false)
            });

        let panels = self.panels.clone();
        self.commands
            .register(commands::START_TUTORIAL_COMMAND, move |req| {
                let locator = SourceLocator::parse(required_arg(req, "uri")?)?;
                let panels = panels.clone();
                tokio::spawn(async move {
                    if let Err(e) = panels.show_or_replace(Some(locator), None).await {
                        warn!("could not open tutorial: {e}");
                    }
                });
                Ok(())
            });

        let panels = self.panels.clone();
        self.commands.register(commands::RELOAD_COMMAND, move |_req| {
            let panels = panels.clone();
            tokio::spawn(async move { panels.hard_reset().await });
            Ok(())
        });

        let panels = self.panels.clone();
        self.commands
            .register(commands::VALIDATE_ALL_REQUIREMENTS_COMMAND, move |_req| {
                panels.request_all_requirement_checks()
            });

        let panels = self.panels.clone();
        self.commands
            .register(commands::REQUIREMENT_CHECK_COMMAND, move |req| {
                let requirement = required_arg(req, "requirement")?.to_string();
                let command = required_arg(req, "command")?.to_string();
                let expected = required_arg(req, "expected")?.to_string();
                let panels = panels.clone();
                tokio::spawn(async move {
                    requirements::requirement_check(&panels, &requirement, &command, &expected)
                        .await;
                });
                Ok(())
            });

        let panels = self.panels.clone();
        self.commands
            .register(commands::CLI_SUCCESS_COMMAND, move |req| {
                let requirement = required_arg(req, "requirement")?.to_string();
                let command = required_arg(req, "command")?.to_string();
                let panels = panels.clone();
                tokio::spawn(async move {
                    requirements::cli_succeeds(&panels, &requirement, &command).await;
                });
                Ok(())
            });
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<TutorialRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn panels(&self) -> &Arc<PanelManager> {
        &self.panels
    }

    pub fn commands(&self) -> &Arc<CommandTable> {
        &self.commands
    }
}

fn required_arg<'r>(request: &'r Request, key: &str) -> Result<&'r str> {
    request
        .arg(key)
        .ok_or_else(|| Error::dispatch(&request.command_id, format!("missing argument \"{key}\"")))
}
