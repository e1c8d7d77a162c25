//! Link-triggered requirement checks.
//!
//! Tutorials can ask the workbench to verify that a CLI tool exists or
//! behaves as expected. These are deliberately thin subprocess wrappers:
//! run the command, inspect output or exit status, report the boolean
//! outcome back to the panel as a `requirementCheck` message.

use tokio::process::Command;
use tracing::{info, warn};

use crate::panel::PanelManager;

async fn run_shell(command: &str) -> std::io::Result<std::process::Output> {
    if cfg!(windows) {
        Command::new("cmd").args(["/C", command]).output().await
    } else {
        Command::new("sh").args(["-c", command]).output().await
    }
}

/// Check that `test_command` succeeds and its stdout contains
/// `expected_text` (e.g. `mvn --version` containing "Apache Maven").
/// The outcome is posted to the panel and returned.
pub async fn requirement_check(
    panel: &PanelManager,
    requirement: &str,
    test_command: &str,
    expected_text: &str,
) -> bool {
    let passed = match run_shell(test_command).await {
        Ok(output) => {
            output.status.success()
                && String::from_utf8_lossy(&output.stdout).contains(expected_text)
        }
        Err(e) => {
            warn!("requirement command {test_command:?} could not run: {e}");
            false
        }
    };
    info!("requirement \"{requirement}\" ({test_command:?} contains {expected_text:?}): {passed}");
    if let Err(e) = panel.post_requirement_result(requirement, passed) {
        warn!("could not report requirement \"{requirement}\": {e}");
    }
    passed
}

/// Check that `test_command` exits with status zero.
pub async fn cli_succeeds(panel: &PanelManager, requirement: &str, test_command: &str) -> bool {
    let passed = match run_shell(test_command).await {
        Ok(output) => output.status.success(),
        Err(e) => {
            warn!("requirement command {test_command:?} could not run: {e}");
            false
        }
    };
    info!("requirement \"{requirement}\" ({test_command:?} exits zero): {passed}");
    if let Err(e) = panel.post_requirement_result(requirement, passed) {
        warn!("could not report requirement \"{requirement}\": {e}");
    }
    passed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ContentCache;
    use crate::commands::CommandTable;
    use crate::content::SourceLocator;
    use crate::content::fakes::FixedResolver;
    use crate::host::fakes::FakeShell;
    use crate::storage::SettingsStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        shell: FakeShell,
        manager: Arc<PanelManager>,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let shell = FakeShell::default();
        let manager = PanelManager::new(
            Arc::new(shell.clone()),
            Arc::new(FixedResolver("<h1>T</h1>".into())),
            Arc::new(CommandTable::new()),
            Arc::new(ContentCache::new(dir.path())),
            Arc::new(SettingsStore::open(dir.path())),
            dir.path(),
        );
        Fixture {
            shell,
            manager,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn passing_check_posts_a_true_result() {
        let fx = fixture();
        fx.manager
            .show_or_replace(Some(SourceLocator::parse("/d/t.md").unwrap()), None)
            .await
            .unwrap();

        let passed =
            requirement_check(&fx.manager, "echo-requirement", "echo hello-world", "hello").await;
        assert!(passed);

        let messages = fx.shell.last_panel().state.lock().messages.clone();
        assert_eq!(
            messages.last().unwrap(),
            r#"{"command":"requirementCheck","requirementName":"echo-requirement","result":true}"#
        );
    }

    #[tokio::test]
    async fn missing_expected_text_fails_the_check() {
        let fx = fixture();
        let passed =
            requirement_check(&fx.manager, "req", "echo something-else", "hello").await;
        assert!(!passed);
    }

    #[tokio::test]
    async fn cli_succeeds_follows_the_exit_status() {
        let fx = fixture();
        assert!(cli_succeeds(&fx.manager, "req", "true").await);
        assert!(!cli_succeeds(&fx.manager, "req", "false").await);
    }

    #[tokio::test]
    async fn unrunnable_command_reports_false_without_error() {
        let fx = fixture();
        let passed = cli_succeeds(
            &fx.manager,
            "req",
            "/definitely/not/a/real/binary --version",
        )
        .await;
        assert!(!passed);
    }
}
