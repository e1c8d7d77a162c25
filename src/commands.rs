//! Command links and the dispatch table.
//!
//! Tutorial documents trigger editor actions through links of the form
//! `guidebook://?commandId=<id>&<key>=<value>…`. The `CommandTable` is the
//! default dispatch collaborator: a registry of handler closures keyed by
//! command id.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::bridge::CommandDispatcher;
use crate::error::{Error, Result};

/// Link scheme recognized inside tutorial documents.
pub const COMMAND_LINK_SCHEME: &str = "guidebook";

// Built-in command ids. These appear verbatim in tutorial documents, so
// renaming one is a breaking change for published tutorials.
pub const START_TUTORIAL_COMMAND: &str = "guidebook.startTutorial";
pub const REGISTER_TUTORIAL_COMMAND: &str = "guidebook.registerTutorial";
pub const REMOVE_TUTORIAL_COMMAND: &str = "guidebook.removeTutorial";
pub const CLEAR_REGISTRY_COMMAND: &str = "guidebook.clearRegistry";
pub const RELOAD_COMMAND: &str = "guidebook.reload";
pub const VALIDATE_ALL_REQUIREMENTS_COMMAND: &str = "guidebook.validateAllRequirements";
pub const REQUIREMENT_CHECK_COMMAND: &str = "guidebook.requirementCheck";
pub const CLI_SUCCESS_COMMAND: &str = "guidebook.cliCommandSuccessful";

/// A parsed command link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub command_id: String,
    /// Remaining query pairs in link order, percent-decoded.
    pub args: Vec<(String, String)>,
}

impl CommandRequest {
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse a `guidebook://?commandId=…` link into a request.
pub fn parse_command_link(link: &str) -> Result<CommandRequest> {
    let url = Url::parse(link).map_err(|e| Error::dispatch(link, format!("invalid link: {e}")))?;
    if url.scheme() != COMMAND_LINK_SCHEME {
        return Err(Error::dispatch(
            link,
            format!("unexpected scheme \"{}\"", url.scheme()),
        ));
    }

    let mut command_id = None;
    let mut args = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == "commandId" && command_id.is_none() {
            command_id = Some(value.into_owned());
        } else {
            args.push((key.into_owned(), value.into_owned()));
        }
    }

    let command_id =
        command_id.ok_or_else(|| Error::dispatch(link, "link carries no commandId"))?;
    Ok(CommandRequest { command_id, args })
}

pub type CommandHandler = Arc<dyn Fn(&CommandRequest) -> Result<()> + Send + Sync>;

/// Registry of command handlers, dispatchable by link.
#[derive(Default)]
pub struct CommandTable {
    handlers: RwLock<HashMap<String, CommandHandler>>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for a command id.
    pub fn register(&self, command_id: &str, handler: impl Fn(&CommandRequest) -> Result<()> + Send + Sync + 'static) {
        self.handlers
            .write()
            .insert(command_id.to_string(), Arc::new(handler));
    }

    pub fn is_registered(&self, command_id: &str) -> bool {
        self.handlers.read().contains_key(command_id)
    }

    pub fn run(&self, request: &CommandRequest) -> Result<()> {
        let handler = self
            .handlers
            .read()
            .get(&request.command_id)
            .cloned()
            .ok_or_else(|| {
                Error::dispatch(
                    &request.command_id,
                    "no command registered under this id",
                )
            })?;
        debug!("dispatching command {}", request.command_id);
        handler(request)
    }
}

impl CommandDispatcher for CommandTable {
    fn dispatch(&self, link: &str) -> Result<()> {
        let request = parse_command_link(link)?;
        self.run(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn parses_command_id_and_ordered_args() {
        let request = parse_command_link(
            "guidebook://?commandId=guidebook.startTutorial&name=Tut%201&category=Cat",
        )
        .unwrap();
        assert_eq!(request.command_id, "guidebook.startTutorial");
        assert_eq!(
            request.args,
            vec![
                ("name".to_string(), "Tut 1".to_string()),
                ("category".to_string(), "Cat".to_string())
            ]
        );
        assert_eq!(request.arg("category"), Some("Cat"));
        assert_eq!(request.arg("missing"), None);
    }

    #[test]
    fn rejects_foreign_schemes() {
        let err = parse_command_link("https://example.com/?commandId=x").unwrap_err();
        assert!(matches!(err, Error::CommandDispatch { .. }));
    }

    #[test]
    fn rejects_links_without_a_command_id() {
        let err = parse_command_link("guidebook://?name=only-args").unwrap_err();
        assert!(matches!(err, Error::CommandDispatch { .. }));
    }

    #[test]
    fn dispatch_runs_the_registered_handler() {
        let table = CommandTable::new();
        let seen: Arc<Mutex<Vec<CommandRequest>>> = Arc::default();
        let sink = seen.clone();
        table.register("demo.echo", move |req| {
            sink.lock().push(req.clone());
            Ok(())
        });

        table
            .dispatch("guidebook://?commandId=demo.echo&value=42")
            .unwrap();

        let calls = seen.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arg("value"), Some("42"));
    }

    #[test]
    fn dispatch_of_an_unknown_command_fails() {
        let table = CommandTable::new();
        let err = table
            .dispatch("guidebook://?commandId=nobody.home")
            .unwrap_err();
        assert!(matches!(err, Error::CommandDispatch { .. }));
    }

    #[test]
    fn handler_errors_propagate_to_the_caller() {
        let table = CommandTable::new();
        table.register("demo.fails", |_| {
            Err(Error::dispatch("demo.fails", "deliberate failure"))
        });
        assert!(table.dispatch("guidebook://?commandId=demo.fails").is_err());
    }
}
