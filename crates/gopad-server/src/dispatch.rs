//! Inbound envelope dispatch.
//!
//! | inbound   | collaborator | outbound (audience)                          |
//! |-----------|--------------|----------------------------------------------|
//! | `format`  | formatter    | `code` (everyone); on failure `error` + `code` with the unformatted source |
//! | `save`    | publisher    | `gist` (everyone); nothing on failure         |
//! | `compile` | compiler     | `stdout` (everyone) when output is non-empty  |
//! | `chat`    | -            | `chat` (everyone), stamped with time and name |
//! | `update`  | -            | `update` (others), tagged with sender name    |
//!
//! Collaborator failures never escape: they become envelopes or log lines.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use gopad_core::{CollaboratorError, Compiler, Envelope, Formatter, Kind, Publisher};
use tracing::{debug, instrument, warn};

use crate::broadcast::{Audience, Outbound};
use crate::registry::{Client, ClientRegistry};

/// Description attached to every published snippet.
pub const PUBLISH_DESCRIPTION: &str = "Shared from gopad";

/// Maps inbound envelopes to behaviour.
pub struct Dispatcher {
    registry: Arc<ClientRegistry>,
    formatter: Arc<dyn Formatter>,
    compiler: Arc<dyn Compiler>,
    publisher: Arc<dyn Publisher>,
    collaborator_timeout: Option<Duration>,
}

impl Dispatcher {
    /// Dispatcher over `registry` using the given collaborators.
    pub fn new(
        registry: Arc<ClientRegistry>,
        formatter: Arc<dyn Formatter>,
        compiler: Arc<dyn Compiler>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            registry,
            formatter,
            compiler,
            publisher,
            collaborator_timeout: None,
        }
    }

    /// Bound every collaborator call; `None` waits indefinitely.
    #[must_use]
    pub fn with_collaborator_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.collaborator_timeout = timeout;
        self
    }

    /// Produce the outbound envelopes for one inbound envelope from `sender`.
    #[instrument(skip_all, fields(kind = %envelope.kind, client_id = %sender.id))]
    pub async fn dispatch(&self, sender: &Client, envelope: Envelope) -> Vec<Outbound> {
        match envelope.kind {
            Kind::Format => self.format(envelope.body).await,
            Kind::Save => self.save(&envelope.body).await,
            Kind::Compile => self.compile(&envelope.body).await,
            Kind::Chat => self.chat(sender, &envelope.body, Local::now()),
            Kind::Update => self.update(sender, envelope.body),
            kind @ (Kind::Info | Kind::Code | Kind::Error | Kind::Gist | Kind::Stdout | Kind::Leave) => {
                debug!(%kind, "ignoring server-to-client kind from client");
                Vec::new()
            }
        }
    }

    async fn format(&self, source: String) -> Vec<Outbound> {
        let result = self.bounded(self.formatter.format(&source)).await;
        match result {
            Ok(formatted) => vec![everyone(Envelope::new(Kind::Code, formatted))],
            Err(e) => {
                warn!(error = %e, error_kind = e.error_kind(), "format failed");
                vec![
                    everyone(Envelope::new(Kind::Error, e.to_string())),
                    everyone(Envelope::new(Kind::Code, source)),
                ]
            }
        }
    }

    async fn save(&self, content: &str) -> Vec<Outbound> {
        match self
            .bounded(self.publisher.publish(PUBLISH_DESCRIPTION, content))
            .await
        {
            Ok(url) => vec![everyone(Envelope::new(Kind::Gist, url))],
            Err(e) => {
                warn!(error = %e, error_kind = e.error_kind(), "publish failed");
                Vec::new()
            }
        }
    }

    async fn compile(&self, source: &str) -> Vec<Outbound> {
        match self.bounded(self.compiler.compile(source)).await {
            Ok(result) => match result.message() {
                Some(message) if !message.is_empty() => {
                    vec![everyone(Envelope::new(Kind::Stdout, message))]
                }
                _ => {
                    debug!(errors = %result.errors, "compile produced no output");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(error = %e, error_kind = e.error_kind(), "compile failed");
                Vec::new()
            }
        }
    }

    fn chat(&self, sender: &Client, text: &str, now: DateTime<Local>) -> Vec<Outbound> {
        let Some(current) = self.registry.lookup(sender.connection.id()) else {
            debug!("chat from unregistered sender dropped");
            return Vec::new();
        };
        let line = chat_line(&kitchen_time(&now), &current.display_name, text);
        vec![everyone(
            Envelope::new(Kind::Chat, line).with_arg(current.display_name.clone()),
        )]
    }

    fn update(&self, sender: &Client, payload: String) -> Vec<Outbound> {
        let Some(current) = self.registry.lookup(sender.connection.id()) else {
            debug!("update from unregistered sender dropped");
            return Vec::new();
        };
        vec![Outbound::new(
            Audience::Others,
            Envelope::new(Kind::Update, payload).with_arg(current.display_name.clone()),
        )]
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, CollaboratorError>>,
    ) -> Result<T, CollaboratorError> {
        match self.collaborator_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| CollaboratorError::Timeout(limit))?,
            None => call.await,
        }
    }
}

fn everyone(envelope: Envelope) -> Outbound {
    Outbound::new(Audience::Everyone, envelope)
}

/// `3:04PM`-style clock time.
pub fn kitchen_time(now: &DateTime<Local>) -> String {
    now.format("%-I:%M%p").to_string()
}

/// `[time] name: text`.
pub fn chat_line(time: &str, name: &str, text: &str) -> String {
    format!("[{time}] {name}: {text}")
}
