//! # devtray-core
//!
//! Shared library for the devtray device widget containing the in-memory
//! model of domains and devices, the menu ordering rules, and the decoded
//! notification and change-set types.
//!
//! This crate has zero dependencies on OS APIs, UI toolkits, or async
//! runtimes.  Everything here can be compiled and tested on any machine.
//!
//! # Architecture overview (for beginners)
//!
//! The tray shows one menu entry per removable device (block storage, USB,
//! microphone).  Each device entry opens a submenu listing the running
//! domains (virtual machines) the device could be attached to.  The
//! virtualization platform broadcasts what happens (a domain started, a
//! device appeared, a device got attached somewhere) and the menu must
//! follow along.
//!
//! This crate defines:
//!
//! - **`domain`** – The model.  `DomainRegistry` and `DeviceRegistry` own the
//!   entities; `CategoryIndex` decides where each device entry sits in the
//!   flat menu; `CandidateMenus` keeps each device's submenu of targets.
//!
//! - **`protocol`** – The vocabulary at the edges.  [`Notification`] is what
//!   the platform tells us; [`ChangeSet`] is what we tell the presentation
//!   layer to do in response.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `devtray_core::DeviceRegistry` instead of the full module path.
pub use domain::candidates::CandidateMenus;
pub use domain::category_index::CategoryIndex;
pub use domain::device_registry::{AddOutcome, DeviceRegistry};
pub use domain::domain_registry::{
    DomainRegistry, ListingDiff, StateTransition, DEFAULT_CONTROLLER_DOMAIN,
};
pub use domain::model::{
    Assignment, AssignmentState, Category, Device, DeviceId, DeviceInfo, Domain, DomainId,
    DomainState, NotFoundError, SortKey, UnknownCategory,
};
pub use protocol::changes::{ChangeSet, MenuChange};
pub use protocol::notification::Notification;
