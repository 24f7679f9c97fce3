//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use gopad_settings::GopadSettings;

/// Runtime configuration for [`GopadServer`](crate::GopadServer).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Directory served under `/static/`.
    pub static_dir: PathBuf,
    /// `Cache-Control` max-age for static assets, in days (at least 1).
    pub cache_days: u32,
    /// Outbound frames buffered per connection before sends fail.
    pub send_queue: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Display-name prefix for participants.
    pub name_prefix: String,
    /// Bound on each collaborator call; `None` waits indefinitely.
    pub collaborator_timeout: Option<Duration>,
}

impl ServerConfig {
    /// Static asset max-age in seconds.
    pub fn cache_max_age_secs(&self) -> u64 {
        u64::from(self.cache_days.max(1)) * 86_400
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            static_dir: PathBuf::from("static"),
            cache_days: 1,
            send_queue: 256,
            max_message_size: 1024 * 1024,
            name_prefix: "U-".into(),
            collaborator_timeout: None,
        }
    }
}

impl From<&GopadSettings> for ServerConfig {
    fn from(settings: &GopadSettings) -> Self {
        let timeout_secs = settings.collaborators.timeout_secs;
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            static_dir: PathBuf::from(&settings.server.static_dir),
            cache_days: settings.server.cache_days.max(1),
            send_queue: settings.server.send_queue.max(1),
            max_message_size: settings.server.max_message_size,
            name_prefix: settings.session.name_prefix.clone(),
            collaborator_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        }
    }
}
