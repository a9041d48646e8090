//! Change-sets: the only way the core talks to the presentation layer.
//!
//! After each notification or user command the core returns a [`ChangeSet`],
//! an ordered list of [`MenuChange`]s.  The presentation layer applies them
//! verbatim and in order; it never inspects the model to decide positions.
//!
//! # The flat menu (for beginners)
//!
//! The tray menu is one flat list.  Devices are grouped by category, and a
//! separator slot sits in front of every category except the first:
//!
//! ```text
//! 0  block  work:sda
//! 1  block  work:sdb
//! 2  ─────  separator 1   (visible: usb group is non-empty)
//! 3  usb    sys-usb:2-1
//! 4  ─────  separator 2   (hidden: mic group is empty)
//! ```
//!
//! Separator slots always occupy a position, visible or not, so the
//! presentation layer should create `Category::COUNT - 1` hidden separators
//! before applying the first change-set.
//!
//! Candidate changes address a device's own submenu, whose positions are
//! independent of the flat list.

use crate::domain::model::{DeviceId, DomainId};

/// A single presentation mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuChange {
    /// Insert a device entry at `position` in the flat menu.
    InsertDevice { position: usize, device: DeviceId },
    /// Remove the device entry currently at `position`.
    RemoveDevice { position: usize, device: DeviceId },
    /// Make separator `index` (1-based category boundary) visible.
    ShowSeparator(usize),
    /// Hide separator `index`.
    HideSeparator(usize),
    /// Insert `domain` at `position` in `device`'s submenu.
    InsertCandidate {
        device: DeviceId,
        position: usize,
        domain: DomainId,
    },
    /// Remove `domain` from `device`'s submenu.
    RemoveCandidate { device: DeviceId, domain: DomainId },
    /// The device's attachment changed; redraw its entry and its submenu's
    /// attached marker.
    Relabel {
        device: DeviceId,
        attached_to: Option<DomainId>,
    },
}

/// Ordered list of [`MenuChange`]s produced by one unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<MenuChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: MenuChange) {
        self.changes.push(change);
    }

    pub fn extend(&mut self, changes: impl IntoIterator<Item = MenuChange>) {
        self.changes.extend(changes);
    }

    pub fn append(&mut self, other: ChangeSet) {
        self.changes.extend(other.changes);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MenuChange> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn into_vec(self) -> Vec<MenuChange> {
        self.changes
    }
}

impl From<Vec<MenuChange>> for ChangeSet {
    fn from(changes: Vec<MenuChange>) -> Self {
        Self { changes }
    }
}

impl IntoIterator for ChangeSet {
    type Item = MenuChange;
    type IntoIter = std::vec::IntoIter<MenuChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a MenuChange;
    type IntoIter = std::slice::Iter<'a, MenuChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}
