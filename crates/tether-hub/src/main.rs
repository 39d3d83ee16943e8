//! # tether-hub
//!
//! Relay hub binary: loads settings, binds every configured listener and
//! routes envelopes between clients until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tether_core::logging::{LogFormat, init_subscriber};
use tether_server::{ServerConfig, TetherServer, message_router};
use tether_settings::{ListenerSettings, TetherSettings};

/// Real-time WebSocket relay hub.
#[derive(Parser, Debug)]
#[command(name = "tether-hub", about = "Real-time WebSocket relay hub")]
struct Cli {
    /// Settings file (defaults to `~/.tether/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host for the first listener (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port for the first listener (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Shared secret clients must send as `apiKey`.
    #[arg(long)]
    api_key: Option<String>,

    /// Log level or `tracing` filter directive.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Apply flags on top of file and environment settings.
    fn apply(&self, settings: &mut TetherSettings) {
        if self.host.is_some() || self.port.is_some() {
            if settings.server.listeners.is_empty() {
                settings.server.listeners.push(ListenerSettings::default());
            }
            let first = &mut settings.server.listeners[0];
            if let Some(ref host) = self.host {
                first.host.clone_from(host);
            }
            if let Some(port) = self.port {
                first.port = port;
            }
        }
        if let Some(ref key) = self.api_key {
            settings.relay.api_key.clone_from(key);
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.log_json {
            settings.logging.json = true;
        }
    }

    fn settings_file(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(tether_settings::settings_path)
    }
}

/// Load, override and validate settings.
fn load(cli: &Cli) -> Result<TetherSettings> {
    let path = cli.settings_file();
    let mut settings = tether_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

fn log_format(settings: &TetherSettings) -> LogFormat {
    if settings.logging.json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(&cli)?;
    init_subscriber(&settings.logging.level, log_format(&settings));

    let config = ServerConfig::from_settings(&settings);
    let router = Arc::new(message_router(&settings.relay));
    let mut server = TetherServer::new(config, router);
    match tether_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics recorder unavailable, /metrics disabled"),
    }

    let bound = server.listen().await.context("Failed to start listeners")?;
    for listener in &bound {
        tracing::info!(listener = %listener.name, addr = %listener.addr, "accepting connections");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutting down...");
    server.shutdown().graceful_shutdown(None).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
