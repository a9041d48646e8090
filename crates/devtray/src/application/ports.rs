//! Ports: the traits the application layer needs from the outside world.
//!
//! Infrastructure provides the real implementations (command-line platform
//! adapter, desktop notifications, menu presenter); tests provide recording
//! fakes or `mockall` mocks.

use async_trait::async_trait;
use devtray_core::{Assignment, ChangeSet, DeviceInfo, Domain};
use thiserror::Error;

use crate::application::sync_engine::EngineView;

// ── Platform ──────────────────────────────────────────────────────────────────

/// Failure reported by the virtualization platform.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    /// The platform refused the request (device busy, policy denied, ...).
    /// The message is the platform's own reason, shown to the user verbatim.
    #[error("{0}")]
    Rejected(String),
    /// The platform could not be reached at all.
    #[error("platform unavailable: {0}")]
    Unavailable(String),
    /// The platform answered with something we could not parse.
    #[error("malformed platform output: {0}")]
    Malformed(String),
}

impl PlatformError {
    /// `true` for a refusal that leaves the platform healthy; retrying later
    /// may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PlatformError::Rejected(_))
    }
}

/// The platform's device and domain API.
///
/// Attach and detach are awaited inline by the event loop: while one is in
/// flight no other notification is processed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Lists every domain with its current state and label.
    async fn list_domains(&self) -> Result<Vec<Domain>, PlatformError>;

    /// Lists every device the platform knows about, of any class.
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, PlatformError>;

    /// Attaches `assignment.backend:assignment.ident` to `assignment.target`.
    async fn attach(&self, assignment: &Assignment) -> Result<(), PlatformError>;

    /// Detaches the device from `assignment.target`.
    async fn detach(&self, assignment: &Assignment) -> Result<(), PlatformError>;
}

// ── User alerts ───────────────────────────────────────────────────────────────

/// How loudly an alert should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// Fire-and-forget desktop notifications.
///
/// Implementations swallow their own failures; the core never learns whether
/// an alert was shown.
pub trait AlertSink: Send + Sync {
    fn notify(&self, text: &str, severity: Severity);
}

// ── Presentation ──────────────────────────────────────────────────────────────

/// Receives change-sets and applies them to the visible menu.
///
/// `view` resolves ids to display names and colour labels; the sink must not
/// use it to decide positions.
pub trait PresentationSink {
    fn apply(&mut self, changes: &ChangeSet, view: &EngineView<'_>);
}
