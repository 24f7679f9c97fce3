//! # gopad-telemetry
//!
//! Structured logging with `tracing`. Output is human-readable text by
//! default or JSON lines when configured; `RUST_LOG` always wins over the
//! configured level.

#![deny(unsafe_code)]

use gopad_settings::LoggingSettings;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Crate targets raised to `debug` by the debug flag.
const GOPAD_TARGETS: &[&str] = &[
    "gopad",
    "gopad_core",
    "gopad_server",
    "gopad_services",
    "gopad_settings",
];

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by `RUST_LOG`.
    pub log_level: Level,
    /// JSON lines instead of text.
    pub json: bool,
    /// Raise gopad's own targets to `debug`.
    pub debug: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            json: false,
            debug: false,
        }
    }
}

impl From<&LoggingSettings> for TelemetryConfig {
    fn from(settings: &LoggingSettings) -> Self {
        Self {
            log_level: settings.level.parse().unwrap_or(Level::INFO),
            json: settings.json,
            debug: settings.debug,
        }
    }
}

/// Failure installing the global subscriber.
#[derive(Debug, thiserror::Error)]
#[error("failed to install tracing subscriber: {0}")]
pub struct TelemetryError(#[from] tracing_subscriber::util::TryInitError);

/// Filter directive string for a config, e.g. `warn,gopad=debug,...`.
pub fn filter_directive(config: &TelemetryConfig) -> String {
    let mut filter = config.log_level.to_string().to_lowercase();
    if config.debug {
        for target in GOPAD_TARGETS {
            filter.push_str(&format!(",{target}=debug"));
        }
    }
    filter
}

/// Initialize the global subscriber. Call once at startup.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config)));

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .try_init()?;
    Ok(())
}
