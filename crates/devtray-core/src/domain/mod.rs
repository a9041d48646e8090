//! Domain model for the devtray device widget.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What lives here? (for beginners)
//!
//! The widget has to answer three questions every time something changes on
//! the platform:
//!
//! 1. *What exists?*  [`domain_registry::DomainRegistry`] and
//!    [`device_registry::DeviceRegistry`] own every known domain and device.
//! 2. *Where does a device entry go in the menu?*
//!    [`category_index::CategoryIndex`] groups devices by category and keeps
//!    each group sorted.
//! 3. *Where can a device be attached?*  [`candidates::CandidateMenus`] keeps,
//!    per device, the sorted list of running domains it may be attached to.
//!
//! None of these types talk to the platform or the screen.  They return
//! [`crate::protocol::changes::MenuChange`] values describing what the screen
//! should do, and the application layer decides when to call the platform.

pub mod candidates;
pub mod category_index;
pub mod device_registry;
pub mod domain_registry;
pub mod model;
