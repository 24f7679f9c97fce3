//! # gopad-services
//!
//! HTTP-backed implementations of the collaborator traits in
//! `gopad_core::collaborator`:
//!
//! - [`PlaygroundFormatter`]: `POST /fmt` on the Go playground
//! - [`PlaygroundCompiler`]: `POST /compile` on the Go playground
//! - [`GistPublisher`]: `POST /gists` on the GitHub API
//!
//! [`mock`] holds in-process fakes for tests.

#![deny(unsafe_code)]

pub mod gist;
pub mod http;
pub mod mock;
pub mod playground;

pub use gist::GistPublisher;
pub use playground::{PlaygroundCompiler, PlaygroundFormatter};

use std::sync::Arc;

use gopad_core::{Compiler, Formatter, Publisher};
use gopad_settings::CollaboratorSettings;

/// The three collaborators, built from settings over one shared HTTP client.
pub struct Collaborators {
    /// Source formatter.
    pub formatter: Arc<dyn Formatter>,
    /// Compile-and-run service.
    pub compiler: Arc<dyn Compiler>,
    /// Snippet publisher.
    pub publisher: Arc<dyn Publisher>,
}

impl Collaborators {
    /// Build HTTP collaborators for the configured endpoints.
    pub fn from_settings(settings: &CollaboratorSettings) -> Result<Self, reqwest::Error> {
        let client = http::build_client()?;
        Ok(Self {
            formatter: Arc::new(PlaygroundFormatter::new(
                client.clone(),
                &settings.playground_url,
            )),
            compiler: Arc::new(PlaygroundCompiler::new(
                client.clone(),
                &settings.playground_url,
            )),
            publisher: Arc::new(GistPublisher::new(
                client,
                &settings.gist_api_url,
                settings.gist_token.clone(),
            )),
        })
    }
}
