//! # gopad
//!
//! Relay binary: loads settings, installs logging, builds the HTTP
//! collaborators and serves the editor until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gopad_server::dispatch::Dispatcher;
use gopad_server::{ClientRegistry, GopadServer, ServerConfig};
use gopad_services::Collaborators;
use gopad_settings::GopadSettings;
use gopad_telemetry::{TelemetryConfig, init_telemetry};
use tracing::{info, warn};

/// Collaborative Go editing relay.
#[derive(Parser, Debug)]
#[command(name = "gopad", version, about = "Collaborative Go editing relay")]
struct Cli {
    /// Settings file (JSON). Missing file means defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind.
    #[arg(long)]
    port: Option<u16>,

    /// Directory served under `/static/`.
    #[arg(long)]
    static_dir: Option<String>,

    /// Verbose logging for gopad's own targets.
    #[arg(long)]
    debug: bool,

    /// Log JSON lines instead of text.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Flags win over file and env settings.
    fn apply(self, settings: &mut GopadSettings) {
        if let Some(host) = self.host {
            settings.server.host = host;
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(dir) = self.static_dir {
            settings.server.static_dir = dir;
        }
        if self.debug {
            settings.logging.debug = true;
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = gopad_settings::load_settings(cli.config.as_deref())
        .context("failed to load settings")?;
    cli.apply(&mut settings);

    init_telemetry(&TelemetryConfig::from(&settings.logging))?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting gopad");

    let collaborators = Collaborators::from_settings(&settings.collaborators)
        .context("failed to build HTTP client")?;
    let config = ServerConfig::from(&settings);
    let registry = Arc::new(ClientRegistry::new(config.name_prefix.clone()));
    let dispatcher = Dispatcher::new(
        Arc::clone(&registry),
        collaborators.formatter,
        collaborators.compiler,
        collaborators.publisher,
    );

    let server = GopadServer::new(config, registry, dispatcher);
    let (addr, handle) = server
        .listen()
        .await
        .context("failed to bind listener")?;
    info!(%addr, "gopad ready");

    server
        .shutdown()
        .wait_for_signal()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutting down");
    if !server.shutdown().drain(vec![handle]).await {
        warn!("server did not stop cleanly");
    }
    Ok(())
}
