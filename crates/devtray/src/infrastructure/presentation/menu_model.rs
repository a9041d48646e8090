//! MenuModel: an in-memory tray menu driven purely by change-sets.
//!
//! The model never looks at the registries to decide where things go.  It
//! applies each [`MenuChange`] literally and reports a [`MenuError`] when a
//! change does not fit what it holds, which means the producer's position
//! bookkeeping has drifted.
//!
//! Initial state: `Category::COUNT - 1` hidden separator slots and nothing
//! else, matching an empty [`devtray_core::CategoryIndex`].

use std::collections::HashMap;

use devtray_core::{Category, ChangeSet, DeviceId, DomainId, MenuChange};
use thiserror::Error;
use tracing::warn;

use crate::application::ports::PresentationSink;
use crate::application::sync_engine::EngineView;

/// A change that does not match the current menu.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MenuError {
    #[error("position {position} is out of range (menu has {len} slots)")]
    PositionOutOfRange { position: usize, len: usize },
    #[error("expected device {expected} at position {position}")]
    DeviceMismatch { position: usize, expected: DeviceId },
    #[error("no separator {0}")]
    UnknownSeparator(usize),
    #[error("no menu entry for device {0}")]
    UnknownDevice(DeviceId),
    #[error("domain {domain} is not in the submenu of {device}")]
    UnknownCandidate { device: DeviceId, domain: DomainId },
}

/// One slot of the flat menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuSlot {
    Device {
        id: DeviceId,
        attached_to: Option<DomainId>,
    },
    Separator {
        index: usize,
        visible: bool,
    },
}

/// The flat menu plus one candidate submenu per device entry.
#[derive(Debug, Clone)]
pub struct MenuModel {
    slots: Vec<MenuSlot>,
    submenus: HashMap<DeviceId, Vec<DomainId>>,
}

impl Default for MenuModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MenuModel {
    pub fn new() -> Self {
        let slots = (1..Category::COUNT)
            .map(|index| MenuSlot::Separator {
                index,
                visible: false,
            })
            .collect();
        Self {
            slots,
            submenus: HashMap::new(),
        }
    }

    /// Applies every change in order, stopping at the first one that does
    /// not fit.
    pub fn apply_all(&mut self, changes: &ChangeSet) -> Result<(), MenuError> {
        for change in changes {
            self.apply_change(change)?;
        }
        Ok(())
    }

    /// Applies a single change.
    pub fn apply_change(&mut self, change: &MenuChange) -> Result<(), MenuError> {
        match change {
            MenuChange::InsertDevice { position, device } => {
                if *position > self.slots.len() {
                    return Err(MenuError::PositionOutOfRange {
                        position: *position,
                        len: self.slots.len(),
                    });
                }
                self.slots.insert(
                    *position,
                    MenuSlot::Device {
                        id: device.clone(),
                        attached_to: None,
                    },
                );
                self.submenus.insert(device.clone(), Vec::new());
            }
            MenuChange::RemoveDevice { position, device } => {
                match self.slots.get(*position) {
                    Some(MenuSlot::Device { id, .. }) if id == device => {}
                    Some(_) => {
                        return Err(MenuError::DeviceMismatch {
                            position: *position,
                            expected: device.clone(),
                        })
                    }
                    None => {
                        return Err(MenuError::PositionOutOfRange {
                            position: *position,
                            len: self.slots.len(),
                        })
                    }
                }
                self.slots.remove(*position);
                self.submenus.remove(device);
            }
            MenuChange::ShowSeparator(index) => self.set_separator(*index, true)?,
            MenuChange::HideSeparator(index) => self.set_separator(*index, false)?,
            MenuChange::InsertCandidate {
                device,
                position,
                domain,
            } => {
                let submenu = self
                    .submenus
                    .get_mut(device)
                    .ok_or_else(|| MenuError::UnknownDevice(device.clone()))?;
                if *position > submenu.len() {
                    return Err(MenuError::PositionOutOfRange {
                        position: *position,
                        len: submenu.len(),
                    });
                }
                submenu.insert(*position, domain.clone());
            }
            MenuChange::RemoveCandidate { device, domain } => {
                let submenu = self
                    .submenus
                    .get_mut(device)
                    .ok_or_else(|| MenuError::UnknownDevice(device.clone()))?;
                let index = submenu.iter().position(|d| d == domain).ok_or_else(|| {
                    MenuError::UnknownCandidate {
                        device: device.clone(),
                        domain: domain.clone(),
                    }
                })?;
                submenu.remove(index);
            }
            MenuChange::Relabel {
                device,
                attached_to: new_target,
            } => {
                let slot = self
                    .slots
                    .iter_mut()
                    .find(|s| matches!(s, MenuSlot::Device { id, .. } if id == device))
                    .ok_or_else(|| MenuError::UnknownDevice(device.clone()))?;
                if let MenuSlot::Device { attached_to, .. } = slot {
                    *attached_to = new_target.clone();
                }
            }
        }
        Ok(())
    }

    fn set_separator(&mut self, wanted: usize, show: bool) -> Result<(), MenuError> {
        for slot in &mut self.slots {
            if let MenuSlot::Separator { index, visible } = slot {
                if *index == wanted {
                    *visible = show;
                    return Ok(());
                }
            }
        }
        Err(MenuError::UnknownSeparator(wanted))
    }

    pub fn slots(&self) -> &[MenuSlot] {
        &self.slots
    }

    /// Device entries in menu order.
    pub fn device_order(&self) -> Vec<&DeviceId> {
        self.slots
            .iter()
            .filter_map(|s| match s {
                MenuSlot::Device { id, .. } => Some(id),
                MenuSlot::Separator { .. } => None,
            })
            .collect()
    }

    pub fn position_of(&self, device: &DeviceId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(s, MenuSlot::Device { id, .. } if id == device))
    }

    /// Indices of the separators currently shown.
    pub fn visible_separators(&self) -> Vec<usize> {
        self.slots
            .iter()
            .filter_map(|s| match s {
                MenuSlot::Separator {
                    index,
                    visible: true,
                } => Some(*index),
                _ => None,
            })
            .collect()
    }

    /// Candidate domains of a device entry, in submenu order.
    pub fn submenu(&self, device: &DeviceId) -> &[DomainId] {
        self.submenus
            .get(device)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Domain shown as attached for a device entry.
    pub fn attached_to(&self, device: &DeviceId) -> Option<&DomainId> {
        self.slots.iter().find_map(|s| match s {
            MenuSlot::Device { id, attached_to } if id == device => attached_to.as_ref(),
            _ => None,
        })
    }

    /// Submenu entries that carry the attached marker.
    pub fn marked_candidates(&self, device: &DeviceId) -> Vec<&DomainId> {
        let attached = self.attached_to(device);
        self.submenu(device)
            .iter()
            .filter(|d| Some(*d) == attached)
            .collect()
    }
}

impl PresentationSink for MenuModel {
    fn apply(&mut self, changes: &ChangeSet, _view: &EngineView<'_>) {
        for change in changes {
            if let Err(err) = self.apply_change(change) {
                warn!(?change, "menu out of step: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev(id: &str) -> DeviceId {
        DeviceId::new(id)
    }

    #[test]
    fn test_new_menu_has_hidden_separator_slots() {
        let menu = MenuModel::new();
        assert_eq!(menu.slots().len(), Category::COUNT - 1);
        assert!(menu.visible_separators().is_empty());
        assert!(menu.device_order().is_empty());
    }

    #[test]
    fn test_insert_show_and_relabel() {
        // Arrange
        let mut menu = MenuModel::new();
        let changes = ChangeSet::from(vec![
            MenuChange::InsertDevice {
                position: 1,
                device: dev("sys-usb:2-1"),
            },
            MenuChange::ShowSeparator(1),
            MenuChange::InsertCandidate {
                device: dev("sys-usb:2-1"),
                position: 0,
                domain: DomainId::new("work"),
            },
            MenuChange::Relabel {
                device: dev("sys-usb:2-1"),
                attached_to: Some(DomainId::new("work")),
            },
        ]);

        // Act
        menu.apply_all(&changes).unwrap();

        // Assert
        assert_eq!(menu.position_of(&dev("sys-usb:2-1")), Some(1));
        assert_eq!(menu.visible_separators(), vec![1]);
        assert_eq!(menu.submenu(&dev("sys-usb:2-1")), &[DomainId::new("work")]);
        assert_eq!(
            menu.marked_candidates(&dev("sys-usb:2-1")),
            vec![&DomainId::new("work")]
        );
    }

    #[test]
    fn test_remove_with_wrong_device_is_mismatch() {
        let mut menu = MenuModel::new();
        menu.apply_change(&MenuChange::InsertDevice {
            position: 0,
            device: dev("a:1"),
        })
        .unwrap();

        let result = menu.apply_change(&MenuChange::RemoveDevice {
            position: 0,
            device: dev("b:1"),
        });

        assert_eq!(
            result,
            Err(MenuError::DeviceMismatch {
                position: 0,
                expected: dev("b:1")
            })
        );
    }

    #[test]
    fn test_out_of_range_insert_is_rejected() {
        let mut menu = MenuModel::new();
        let result = menu.apply_change(&MenuChange::InsertDevice {
            position: 7,
            device: dev("a:1"),
        });
        assert!(matches!(result, Err(MenuError::PositionOutOfRange { .. })));
    }

    #[test]
    fn test_candidate_for_unknown_device_is_rejected() {
        let mut menu = MenuModel::new();
        let result = menu.apply_change(&MenuChange::RemoveCandidate {
            device: dev("a:1"),
            domain: DomainId::new("work"),
        });
        assert_eq!(result, Err(MenuError::UnknownDevice(dev("a:1"))));
    }

    #[test]
    fn test_unknown_separator_is_rejected() {
        let mut menu = MenuModel::new();
        assert_eq!(
            menu.apply_change(&MenuChange::ShowSeparator(0)),
            Err(MenuError::UnknownSeparator(0))
        );
    }
}
