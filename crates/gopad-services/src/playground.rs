//! Go playground collaborators.

use async_trait::async_trait;
use gopad_core::{CollaboratorError, CompileResult, Compiler, Formatter};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::http::{endpoint, send_json};

/// Formats source with the playground's `/fmt` endpoint (gofmt + goimports).
pub struct PlaygroundFormatter {
    client: reqwest::Client,
    url: String,
}

impl PlaygroundFormatter {
    /// Formatter against `base_url`.
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: endpoint(base_url, "fmt"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FmtResponse {
    #[serde(rename = "Body", default)]
    body: String,
    #[serde(rename = "Error", default)]
    error: String,
}

#[async_trait]
impl Formatter for PlaygroundFormatter {
    #[instrument(skip_all, fields(len = source.len()))]
    async fn format(&self, source: &str) -> Result<String, CollaboratorError> {
        let request = self
            .client
            .post(&self.url)
            .form(&[("body", source), ("imports", "true")]);
        let response: FmtResponse = send_json(request).await?;
        if !response.error.is_empty() {
            return Err(CollaboratorError::Rejected(response.error));
        }
        debug!(formatted_len = response.body.len(), "source formatted");
        Ok(response.body)
    }
}

/// Compiles and runs source with the playground's `/compile` endpoint.
pub struct PlaygroundCompiler {
    client: reqwest::Client,
    url: String,
}

impl PlaygroundCompiler {
    /// Compiler against `base_url`.
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: endpoint(base_url, "compile"),
        }
    }
}

#[async_trait]
impl Compiler for PlaygroundCompiler {
    #[instrument(skip_all, fields(len = source.len()))]
    async fn compile(&self, source: &str) -> Result<CompileResult, CollaboratorError> {
        let request = self
            .client
            .post(&self.url)
            .form(&[("version", "2"), ("body", source)]);
        let result: CompileResult = send_json(request).await?;
        debug!(
            events = result.events.len(),
            has_errors = !result.errors.is_empty(),
            "compile finished"
        );
        Ok(result)
    }
}
