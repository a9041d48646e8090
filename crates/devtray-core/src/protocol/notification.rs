//! Platform notifications, as delivered by the notification bus.
//!
//! The transport is somebody else's problem: by the time a [`Notification`]
//! reaches the core it has been received, decoded, and deduplicated as far
//! as the bus can.  Delivery is at-least-once but ordered per entity, so
//! every handler must tolerate repeats.
//!
//! # Wire shape
//!
//! Notifications derive `Deserialize` with an internal `kind` tag so that
//! plumbing which speaks JSON can hand them over directly:
//!
//! ```json
//! {"kind": "domain_state", "domain": "personal", "state": "Started"}
//! {"kind": "device_attached", "device": "sys-usb:2-1", "domain": "work"}
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::model::{DeviceId, DeviceInfo, DomainId, DomainState};

/// A change broadcast by the virtualization platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A domain was created.  Triggers a full re-listing of domains.
    DomainAdded { domain: DomainId },
    /// A domain was deleted.  Triggers a full re-listing of domains.
    DomainRemoved { domain: DomainId },
    /// A domain changed lifecycle state.
    #[serde(rename = "domain_state")]
    DomainStateChanged { domain: DomainId, state: DomainState },
    /// A device appeared on its backend domain.
    DeviceAdded { device: DeviceInfo },
    /// A device disappeared.
    DeviceRemoved { device: DeviceId },
    /// A device was attached to a domain (possibly by another client).
    DeviceAttached { device: DeviceId, domain: DomainId },
    /// A device was detached from whatever domain held it.
    DeviceDetached { device: DeviceId },
}

impl Notification {
    /// Short name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::DomainAdded { .. } => "domain_added",
            Notification::DomainRemoved { .. } => "domain_removed",
            Notification::DomainStateChanged { .. } => "domain_state",
            Notification::DeviceAdded { .. } => "device_added",
            Notification::DeviceRemoved { .. } => "device_removed",
            Notification::DeviceAttached { .. } => "device_attached",
            Notification::DeviceDetached { .. } => "device_detached",
        }
    }
}
