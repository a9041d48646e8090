//! User alert sinks.
//!
//! - [`NotifySendAlerts`] shows desktop notifications by spawning
//!   `notify-send` (or the configured equivalent).
//! - [`LogAlerts`] writes alerts to the log only; used when alerts are
//!   disabled in the configuration.
//! - **`mock`** records alerts for tests.
//!
//! Alerts are fire-and-forget: a notification daemon that is missing or
//! slow never holds up the event loop.

pub mod mock;

use tokio::process::Command;
use tracing::{info, warn};

use crate::application::ports::{AlertSink, Severity};
use crate::infrastructure::storage::config::AlertConfig;

/// Desktop notifications via an external command.
pub struct NotifySendAlerts {
    command: String,
    error_timeout_ms: u32,
    error_icon: String,
}

impl NotifySendAlerts {
    pub fn new(config: &AlertConfig) -> Self {
        Self {
            command: config.command.clone(),
            error_timeout_ms: config.error_timeout_ms,
            error_icon: config.error_icon.clone(),
        }
    }

    /// Command-line arguments for one alert.
    pub fn args(&self, text: &str, severity: Severity) -> Vec<String> {
        let mut args = Vec::new();
        if severity == Severity::Error {
            args.push("--expire-time".to_string());
            args.push(self.error_timeout_ms.to_string());
            args.push("--icon".to_string());
            args.push(self.error_icon.clone());
        }
        args.push(text.to_string());
        args
    }
}

impl AlertSink for NotifySendAlerts {
    fn notify(&self, text: &str, severity: Severity) {
        info!(?severity, "alert: {text}");
        // The child is not awaited; tokio reaps it in the background.
        if let Err(err) = Command::new(&self.command)
            .args(self.args(text, severity))
            .spawn()
        {
            warn!(command = %self.command, "could not show alert: {err}");
        }
    }
}

/// Alerts written to the log and nowhere else.
#[derive(Debug, Default)]
pub struct LogAlerts;

impl AlertSink for LogAlerts {
    fn notify(&self, text: &str, severity: Severity) {
        match severity {
            Severity::Info => info!("alert: {text}"),
            Severity::Error => warn!("alert: {text}"),
        }
    }
}
