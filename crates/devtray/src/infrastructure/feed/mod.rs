//! Notification feed: JSON lines on an async reader, into the engine queue.
//!
//! Each line is one JSON object, either a platform notification (tagged by
//! `kind`) or a user command (tagged by `command`):
//!
//! ```text
//! {"kind": "device_added", "device": {"backend": "sys-usb", "ident": "2-1", "category": "usb"}}
//! {"kind": "domain_state", "domain": "work", "state": "Started"}
//! {"command": "toggle", "device": "sys-usb:2-1", "domain": "work"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.  A malformed line is
//! logged and skipped; it never stops the feed.
//!
//! The reader task only decodes and forwards.  Everything that touches the
//! model happens on the engine's side of the channel, one input at a time.

use devtray_core::Notification;
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::sync_engine::{EngineInput, UserCommand};

/// Error type for the notification feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("I/O error reading feed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed feed line: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedLine {
    Notification(Notification),
    Command(UserCommand),
}

/// Decodes one feed line.  Returns `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<EngineInput>, FeedError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let input = match serde_json::from_str::<FeedLine>(line)? {
        FeedLine::Notification(notification) => EngineInput::Notification(notification),
        FeedLine::Command(command) => EngineInput::Command(command),
    };
    Ok(Some(input))
}

/// Reads lines until EOF, forwarding each decoded input to `tx`.
///
/// Returns when the reader is exhausted or the receiving side has gone away.
///
/// # Errors
///
/// Returns [`FeedError::Io`] if reading fails.  Malformed lines are not
/// errors.
pub async fn run_feed<R>(reader: R, tx: mpsc::Sender<EngineInput>) -> Result<(), FeedError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Ok(Some(input)) => {
                if tx.send(input).await.is_err() {
                    debug!("engine queue closed; stopping feed");
                    return Ok(());
                }
            }
            Ok(None) => {}
            Err(err) => warn!("skipping feed line: {err}"),
        }
    }
    info!("notification feed reached end of input");
    Ok(())
}

/// Spawns a task feeding standard input into `tx`.
pub fn spawn_stdin_feed(tx: mpsc::Sender<EngineInput>) -> JoinHandle<Result<(), FeedError>> {
    tokio::spawn(run_feed(BufReader::new(tokio::io::stdin()), tx))
}
