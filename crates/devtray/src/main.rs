//! devtray: tray widget engine for attaching removable devices to domains.
//!
//! Reads platform notifications and user commands as JSON lines on standard
//! input, keeps an in-memory model of domains and devices, and drives the
//! platform's `qvm-device` tool to attach and detach devices.
//!
//! # Usage
//!
//! ```text
//! devtray [OPTIONS]
//!
//! Options:
//!   --config <PATH>               Config file [default: $XDG_CONFIG_HOME/devtray/config.toml]
//!   --log-level <LEVEL>           Log level when RUST_LOG is unset
//!   --controller-domain <NAME>    Privileged domain that never receives devices
//! ```
//!
//! # Architecture overview
//!
//! ```text
//! stdin (JSON lines) ──► feed task ──► mpsc ──► SyncEngine ──► ChangeSet ──► presenter
//!                                                  │
//!                                                  ├──► qvm-ls / qvm-device
//!                                                  └──► notify-send
//! ```
//!
//! Only the engine touches the model, and it handles one input at a time.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use devtray::application::ports::{AlertSink, PresentationSink, Severity};
use devtray::application::sync_engine::{EngineSettings, SyncEngine};
use devtray::infrastructure::alerts::{LogAlerts, NotifySendAlerts};
use devtray::infrastructure::feed::spawn_stdin_feed;
use devtray::infrastructure::platform::QubesCliPlatform;
use devtray::infrastructure::presentation::LoggingPresenter;
use devtray::infrastructure::storage::config::{load_config, load_config_from, TrayConfig};

/// Inputs buffered between the feed task and the engine.
const INPUT_QUEUE_DEPTH: usize = 256;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Tray widget engine for attaching removable devices to running domains.
#[derive(Debug, Parser)]
#[command(name = "devtray", version)]
struct Cli {
    /// Path of the TOML config file.
    ///
    /// Defaults to `config.toml` in `$XDG_CONFIG_HOME/devtray`.
    #[arg(long, env = "DEVTRAY_CONFIG")]
    config: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is not set.  Overrides the config file.
    #[arg(long, env = "DEVTRAY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Name of the privileged controller domain.  Overrides the config file.
    #[arg(long, env = "DEVTRAY_CONTROLLER_DOMAIN")]
    controller_domain: Option<String>,
}

impl Cli {
    /// Loads the config file and applies command-line overrides.
    fn load_config(&self) -> anyhow::Result<TrayConfig> {
        let config = match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => load_config().context("loading config")?,
        };
        Ok(self.apply_overrides(config))
    }

    fn apply_overrides(&self, mut config: TrayConfig) -> TrayConfig {
        if let Some(level) = &self.log_level {
            config.tray.log_level = level.clone();
        }
        if let Some(controller) = &self.controller_domain {
            config.tray.controller_domain = controller.clone();
        }
        config
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // `RUST_LOG` wins; otherwise the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.tray.log_level)),
        )
        .init();

    info!(
        controller = %config.tray.controller_domain,
        "devtray starting"
    );

    let alerts: Arc<dyn AlertSink> = if config.alerts.enabled {
        Arc::new(NotifySendAlerts::new(&config.alerts))
    } else {
        Arc::new(LogAlerts)
    };
    let platform = Arc::new(QubesCliPlatform::new(&config.platform));
    let mut engine = SyncEngine::new(
        platform,
        Arc::clone(&alerts),
        EngineSettings {
            controller_domain: config.tray.controller_domain.clone(),
            announce_devices: config.tray.announce_devices,
        },
    );
    let mut presenter = LoggingPresenter::new();

    // ── Initial population ────────────────────────────────────────────────────
    //
    // Without a first listing there is no model to keep live, so this is the
    // one failure that ends the process.
    let initial = match engine.resync().await {
        Ok(changes) => changes,
        Err(err) => {
            error!("cannot reach the platform at startup: {err}");
            alerts.notify(
                &format!("Device widget cannot start. Error: {err}"),
                Severity::Error,
            );
            return Err(err).context("initial platform listing");
        }
    };
    presenter.apply(&initial, &engine.view());

    // ── Event loop ────────────────────────────────────────────────────────────
    let (tx, mut rx) = mpsc::channel(INPUT_QUEUE_DEPTH);
    let mut feed = spawn_stdin_feed(tx);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    error!("failed to listen for Ctrl+C signal: {e}");
                }
                info!("received Ctrl+C, shutting down");
                feed.abort();
                break;
            }
            input = rx.recv() => {
                let Some(input) = input else {
                    match (&mut feed).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => error!("notification feed failed: {e}"),
                        Err(e) => error!("notification feed task panicked: {e}"),
                    }
                    break;
                };
                let changes = engine.handle(input).await;
                presenter.apply(&changes, &engine.view());
            }
        }
    }

    info!("devtray stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
