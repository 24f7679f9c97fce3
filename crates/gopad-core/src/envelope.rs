//! Message envelope exchanged with browser clients.
//!
//! On the wire an envelope is a JSON object with the field names the browser
//! client expects: `{"Kind": "chat", "Body": "...", "Args": [...]}`. `Body`
//! defaults to the empty string and `Args` to an empty sequence (a `null`
//! `Args` is accepted too).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::EnvelopeError;
use crate::serde_helpers::null_as_empty;

/// Closed set of envelope tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Client asks for the shared source to be formatted.
    Format,
    /// Client asks for the shared source to be published.
    Save,
    /// Client asks for the shared source to be compiled and run.
    Compile,
    /// Chat line (both directions).
    Chat,
    /// Live-editing payload relayed to the other participants.
    Update,
    /// Welcome / presence notice.
    Info,
    /// Replacement source text.
    Code,
    /// User-visible failure text.
    Error,
    /// Public URL of a published snippet.
    Gist,
    /// Program output.
    Stdout,
    /// Presence notice for a departed participant.
    Leave,
}

impl Kind {
    /// Wire tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Format => "format",
            Self::Save => "save",
            Self::Compile => "compile",
            Self::Chat => "chat",
            Self::Update => "update",
            Self::Info => "info",
            Self::Code => "code",
            Self::Error => "error",
            Self::Gist => "gist",
            Self::Stdout => "stdout",
            Self::Leave => "leave",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of communication in both directions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message tag.
    #[serde(rename = "Kind")]
    pub kind: Kind,
    /// Payload; meaning depends on `kind`.
    #[serde(rename = "Body", default)]
    pub body: String,
    /// Order-significant auxiliary values.
    #[serde(rename = "Args", default, deserialize_with = "null_as_empty")]
    pub args: Vec<Value>,
}

impl Envelope {
    /// Envelope with no args.
    pub fn new(kind: Kind, body: impl Into<String>) -> Self {
        Self {
            kind,
            body: body.into(),
            args: Vec::new(),
        }
    }

    /// Append one auxiliary value.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Parse a text frame.
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        serde_json::from_str(text).map_err(EnvelopeError::Malformed)
    }

    /// Serialize to a text frame.
    pub fn encode(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(EnvelopeError::Encode)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind)?;
        writeln!(f, "{}", self.body)
    }
}
