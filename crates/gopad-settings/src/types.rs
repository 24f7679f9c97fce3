//! Settings type definitions.
//!
//! Field names are camelCase in JSON. Every section is `#[serde(default)]`,
//! so a settings file only needs the keys it changes.

use serde::{Deserialize, Serialize};

/// Root settings type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GopadSettings {
    /// HTTP / WebSocket listener.
    pub server: ServerSettings,
    /// Participant naming.
    pub session: SessionSettings,
    /// External format / compile / publish services.
    pub collaborators: CollaboratorSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Listener and transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Directory served under `/static/`.
    pub static_dir: String,
    /// Browser cache lifetime for static assets, in days.
    pub cache_days: u32,
    /// Outbound queue depth per connection.
    pub send_queue: usize,
    /// Largest accepted WebSocket message, in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            static_dir: "static".to_string(),
            cache_days: 1,
            send_queue: 256,
            max_message_size: 1024 * 1024,
        }
    }
}

/// Participant settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Prefix for generated display names (`U-` gives `U-01`, `U-02`, ...).
    pub name_prefix: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            name_prefix: "U-".to_string(),
        }
    }
}

/// Collaborator endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollaboratorSettings {
    /// Base URL of the Go playground (`/fmt`, `/compile`).
    pub playground_url: String,
    /// Base URL of the gist API.
    pub gist_api_url: String,
    /// Bearer token for the gist API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gist_token: Option<String>,
    /// Per-call bound in seconds; `0` disables the bound.
    pub timeout_secs: u64,
}

impl Default for CollaboratorSettings {
    fn default() -> Self {
        Self {
            playground_url: "https://play.golang.org".to_string(),
            gist_api_url: "https://api.github.com".to_string(),
            gist_token: None,
            timeout_secs: 0,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
    /// Raise gopad's own targets to `debug`.
    pub debug: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            debug: false,
        }
    }
}
