//! Contracts for the external services the dispatcher calls.
//!
//! Implementations live in `gopad-services`; the server only sees these
//! traits so tests can substitute in-process fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::CollaboratorError;
use crate::serde_helpers::null_as_empty;

/// Source formatter (gofmt + goimports).
#[async_trait]
pub trait Formatter: Send + Sync {
    /// Return the formatted form of `source`.
    async fn format(&self, source: &str) -> Result<String, CollaboratorError>;
}

/// Remote compile-and-run service.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Compile and run `source`, returning the structured result.
    async fn compile(&self, source: &str) -> Result<CompileResult, CollaboratorError>;
}

/// Snippet publishing service.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `content` and return its public URL.
    async fn publish(&self, description: &str, content: &str) -> Result<String, CollaboratorError>;
}

/// Result of a compile request, in the playground's response shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResult {
    /// Build errors, if any.
    #[serde(rename = "Errors", default)]
    pub errors: String,
    /// Output events in emission order.
    #[serde(rename = "Events", default, deserialize_with = "null_as_empty")]
    pub events: Vec<CompileEvent>,
}

/// One timed output event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileEvent {
    /// Text written by the program.
    #[serde(rename = "Message", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Stream the text went to (`stdout` / `stderr`).
    #[serde(rename = "Kind", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Delay before the event, in nanoseconds.
    #[serde(rename = "Delay", default)]
    pub delay: i64,
}

impl CompileResult {
    /// Message of the first event carrying a non-empty one.
    pub fn message(&self) -> Option<&str> {
        self.events
            .iter()
            .find_map(|e| e.message.as_deref().filter(|m| !m.is_empty()))
    }
}
