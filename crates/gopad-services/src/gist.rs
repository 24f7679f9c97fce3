//! GitHub gist publisher.

use std::collections::HashMap;

use async_trait::async_trait;
use gopad_core::{CollaboratorError, Publisher};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::http::{endpoint, send_json};

/// File name used for the published snippet.
const GIST_FILE_NAME: &str = "src.go";

/// Publishes snippets as public gists.
pub struct GistPublisher {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl GistPublisher {
    /// Publisher against `api_url`, optionally authenticated.
    pub fn new(client: reqwest::Client, api_url: &str, token: Option<String>) -> Self {
        Self {
            client,
            url: endpoint(api_url, "gists"),
            token,
        }
    }
}

#[derive(Debug, Serialize)]
struct GistRequest<'a> {
    description: &'a str,
    public: bool,
    files: HashMap<&'static str, GistFile<'a>>,
}

#[derive(Debug, Serialize)]
struct GistFile<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct GistResponse {
    #[serde(default)]
    html_url: Option<String>,
}

#[async_trait]
impl Publisher for GistPublisher {
    #[instrument(skip_all, fields(len = content.len()))]
    async fn publish(&self, description: &str, content: &str) -> Result<String, CollaboratorError> {
        let payload = GistRequest {
            description,
            public: true,
            files: HashMap::from([(GIST_FILE_NAME, GistFile { content })]),
        };

        let mut request = self
            .client
            .post(&self.url)
            .header("accept", "application/vnd.github+json")
            .json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response: GistResponse = send_json(request).await?;
        let url = response
            .html_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| CollaboratorError::InvalidResponse("missing html_url".into()))?;
        debug!(url, "gist published");
        Ok(url)
    }
}
