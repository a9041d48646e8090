//! CandidateMenus: the per-device list of domains the device could go to.
//!
//! Every device entry in the tray owns a submenu listing its *candidate
//! targets*: started domains that are neither its backend nor the
//! controller.  This module tracks what each submenu currently shows and
//! emits [`MenuChange`]s as domains come and go, so the presentation layer
//! never has to rebuild a submenu from scratch.
//!
//! Entries are ordered by domain name (ties broken by id), matching
//! [`crate::DomainRegistry::list`].

use std::collections::HashMap;

use tracing::debug;

use crate::domain::model::{DeviceId, Domain, DomainId};
use crate::protocol::changes::MenuChange;

type Entry = (String, DomainId);

/// Submenu contents for every open device entry.
#[derive(Debug, Default)]
pub struct CandidateMenus {
    menus: HashMap<DeviceId, Vec<Entry>>,
}

fn entry_of(domain: &Domain) -> Entry {
    (domain.name.clone(), domain.id.clone())
}

impl CandidateMenus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the submenu for a new device entry, filled with `targets`.
    ///
    /// Re-opening an existing submenu is treated as a [`sync`](Self::sync).
    pub fn open(&mut self, device: &DeviceId, targets: &[&Domain]) -> Vec<MenuChange> {
        if self.menus.contains_key(device) {
            return self.sync(device, targets);
        }
        self.menus.insert(device.clone(), Vec::new());
        let mut changes = Vec::new();
        for domain in targets {
            changes.extend(self.insert_domain(device, domain));
        }
        changes
    }

    /// Drops a device's submenu entirely.  The entry removal already takes
    /// the submenu with it, so no changes are emitted.
    pub fn close(&mut self, device: &DeviceId) {
        self.menus.remove(device);
    }

    /// Adds `domain` to a device's submenu at its ordered position.
    pub fn insert_domain(&mut self, device: &DeviceId, domain: &Domain) -> Vec<MenuChange> {
        let Some(menu) = self.menus.get_mut(device) else {
            debug!(device = %device, "no submenu for device");
            return Vec::new();
        };
        if menu.iter().any(|(_, id)| id == &domain.id) {
            return Vec::new();
        }
        let entry = entry_of(domain);
        let position = menu.iter().filter(|e| **e < entry).count();
        menu.insert(position, entry);
        vec![MenuChange::InsertCandidate {
            device: device.clone(),
            position,
            domain: domain.id.clone(),
        }]
    }

    /// Removes `domain` from a device's submenu if present.
    pub fn remove_domain(&mut self, device: &DeviceId, domain: &DomainId) -> Vec<MenuChange> {
        let Some(menu) = self.menus.get_mut(device) else {
            return Vec::new();
        };
        let Some(index) = menu.iter().position(|(_, id)| id == domain) else {
            return Vec::new();
        };
        menu.remove(index);
        vec![MenuChange::RemoveCandidate {
            device: device.clone(),
            domain: domain.clone(),
        }]
    }

    /// Brings a device's submenu in line with `targets`.
    ///
    /// Stale entries are removed first, then missing ones inserted.
    pub fn sync(&mut self, device: &DeviceId, targets: &[&Domain]) -> Vec<MenuChange> {
        let Some(menu) = self.menus.get(device) else {
            return Vec::new();
        };
        let stale: Vec<DomainId> = menu
            .iter()
            .filter(|(name, id)| !targets.iter().any(|d| &d.id == id && &d.name == name))
            .map(|(_, id)| id.clone())
            .collect();

        let mut changes = Vec::new();
        for domain in &stale {
            changes.extend(self.remove_domain(device, domain));
        }
        for domain in targets {
            changes.extend(self.insert_domain(device, domain));
        }
        changes
    }

    /// Domains currently listed in a device's submenu, in menu order.
    pub fn candidates(&self, device: &DeviceId) -> Vec<&DomainId> {
        self.menus
            .get(device)
            .map(|menu| menu.iter().map(|(_, id)| id).collect())
            .unwrap_or_default()
    }

    /// Devices with an open submenu, sorted.
    pub fn devices(&self) -> Vec<&DeviceId> {
        let mut devices: Vec<&DeviceId> = self.menus.keys().collect();
        devices.sort();
        devices
    }

    pub fn is_open(&self, device: &DeviceId) -> bool {
        self.menus.contains_key(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::DomainState;

    fn domain(name: &str) -> Domain {
        Domain {
            id: DomainId::new(name),
            name: name.to_string(),
            state: DomainState::Started,
            label: "blue".to_string(),
        }
    }

    fn dev() -> DeviceId {
        DeviceId::new("sys-usb:2-1")
    }

    #[test]
    fn test_open_lists_targets_in_order() {
        let mut menus = CandidateMenus::new();
        let (a, b) = (domain("personal"), domain("work"));

        let changes = menus.open(&dev(), &[&a, &b]);

        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes[1],
            MenuChange::InsertCandidate {
                device: dev(),
                position: 1,
                domain: DomainId::new("work")
            }
        );
        let names: Vec<&str> = menus.candidates(&dev()).iter().map(|d| d.as_str()).collect();
        assert_eq!(names, vec!["personal", "work"]);
    }

    #[test]
    fn test_insert_domain_uses_name_order() {
        // Arrange
        let mut menus = CandidateMenus::new();
        menus.open(&dev(), &[&domain("alpha"), &domain("zulu")]);

        // Act
        let changes = menus.insert_domain(&dev(), &domain("mike"));

        // Assert
        assert_eq!(
            changes,
            vec![MenuChange::InsertCandidate {
                device: dev(),
                position: 1,
                domain: DomainId::new("mike")
            }]
        );
    }

    #[test]
    fn test_insert_domain_twice_is_noop() {
        let mut menus = CandidateMenus::new();
        menus.open(&dev(), &[&domain("work")]);
        assert!(menus.insert_domain(&dev(), &domain("work")).is_empty());
        assert_eq!(menus.candidates(&dev()).len(), 1);
    }

    #[test]
    fn test_remove_domain_absent_is_noop() {
        let mut menus = CandidateMenus::new();
        menus.open(&dev(), &[&domain("work")]);
        assert!(menus
            .remove_domain(&dev(), &DomainId::new("vault"))
            .is_empty());
        assert_eq!(menus.remove_domain(&dev(), &DomainId::new("work")).len(), 1);
        assert!(menus.candidates(&dev()).is_empty());
    }

    #[test]
    fn test_sync_removes_stale_then_inserts_missing() {
        let mut menus = CandidateMenus::new();
        menus.open(&dev(), &[&domain("personal"), &domain("vault")]);

        let changes = menus.sync(&dev(), &[&domain("personal"), &domain("work")]);

        assert_eq!(
            changes,
            vec![
                MenuChange::RemoveCandidate {
                    device: dev(),
                    domain: DomainId::new("vault")
                },
                MenuChange::InsertCandidate {
                    device: dev(),
                    position: 1,
                    domain: DomainId::new("work")
                },
            ]
        );
    }

    #[test]
    fn test_changes_for_unknown_device_are_empty() {
        let mut menus = CandidateMenus::new();
        assert!(menus.insert_domain(&dev(), &domain("work")).is_empty());
        assert!(menus.sync(&dev(), &[&domain("work")]).is_empty());
        assert!(menus.candidates(&dev()).is_empty());
    }

    #[test]
    fn test_close_drops_submenu() {
        let mut menus = CandidateMenus::new();
        menus.open(&dev(), &[&domain("work")]);
        menus.close(&dev());
        assert!(!menus.is_open(&dev()));
    }
}
