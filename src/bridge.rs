//! Wire protocol between the panel controller and the embedded content.
//!
//! Messages travel as single-line JSON strings with a `command` field.
//! The field names are frozen: the script running inside the webview
//! matches on them verbatim. Payloads are built by serde, never by string
//! interpolation.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Messages posted into the webview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum OutgoingMessage {
    /// Opaque string payload for the embedded script.
    SendMessage { data: String },
    /// Result of a single requirement check.
    #[serde(rename_all = "camelCase")]
    RequirementCheck {
        requirement_name: String,
        result: bool,
    },
    /// Ask the content to run every requirement check it knows about.
    AllRequirementCheck,
    /// Ask the content to report its requirement links.
    ReturnRequirements,
    /// Ask the content to report its command links.
    ReturnCommands,
}

impl OutgoingMessage {
    /// Encode as the single-line JSON the webview script expects.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("outgoing messages serialize infallibly")
    }
}

/// Messages the webview reports back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum IncomingMessage {
    /// The webview's live-edited HTML, replacing the in-memory content.
    Update { text: Option<String> },
    /// A clicked internal link's href text.
    Link { text: Option<String> },
}

impl IncomingMessage {
    pub fn decode(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Command dispatch collaborator: takes a clicked link string and invokes
/// the corresponding registered command.
pub trait CommandDispatcher: Send + Sync {
    fn dispatch(&self, link: &str) -> Result<()>;
}
