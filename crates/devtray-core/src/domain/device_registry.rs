//! DeviceRegistry: every known device in a recognised category.
//!
//! The registry is the category gate: [`DeviceRegistry::add`] only admits a
//! [`DeviceInfo`] whose class tag parses as a [`Category`].  Anything else is
//! logged and never enters the model.
//!
//! It also answers the question "where may this device go?" by combining its
//! own entries with a [`DomainRegistry`]; see
//! [`candidate_targets`](DeviceRegistry::candidate_targets).

use std::collections::HashMap;

use tracing::debug;

use crate::domain::domain_registry::DomainRegistry;
use crate::domain::model::{
    Category, Device, DeviceId, DeviceInfo, Domain, DomainId, DomainState, NotFoundError, SortKey,
};

/// What happened to a [`DeviceInfo`] handed to [`DeviceRegistry::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The device is new and was stored.
    Added(DeviceId),
    /// A device with this id already exists; nothing changed.
    AlreadyKnown(DeviceId),
    /// The class tag is not a recognised category; nothing changed.
    Unrecognized(String),
}

/// In-memory registry of recognised devices.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<DeviceId, Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a device reported by the platform.
    ///
    /// Devices outside the recognised categories are ignored (logged at
    /// `debug`), as are repeats of an id already present.
    pub fn add(&mut self, info: DeviceInfo) -> AddOutcome {
        let category: Category = match info.category.parse() {
            Ok(category) => category,
            Err(err) => {
                debug!(device = %info.id(), "ignoring device: {err}");
                return AddOutcome::Unrecognized(info.category);
            }
        };

        let id = info.id();
        if self.devices.contains_key(&id) {
            debug!(device = %id, "device already known");
            return AddOutcome::AlreadyKnown(id);
        }

        self.devices.insert(
            id.clone(),
            Device {
                id: id.clone(),
                category,
                backend: info.backend,
                frontend: info.frontend,
                ident: info.ident,
                display_name: info.display_name,
            },
        );
        AddOutcome::Added(id)
    }

    /// Removes a device.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] if the id is unknown.
    pub fn remove(&mut self, id: &DeviceId) -> Result<Device, NotFoundError> {
        self.devices
            .remove(id)
            .ok_or_else(|| NotFoundError::device(id))
    }

    /// Sets (or clears) the domain a device is attached to.
    ///
    /// Returns the previous frontend.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] if the id is unknown.
    pub fn set_frontend(
        &mut self,
        id: &DeviceId,
        frontend: Option<DomainId>,
    ) -> Result<Option<DomainId>, NotFoundError> {
        let device = self
            .devices
            .get_mut(id)
            .ok_or_else(|| NotFoundError::device(id))?;
        Ok(std::mem::replace(&mut device.frontend, frontend))
    }

    pub fn get(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.devices.contains_key(id)
    }

    /// Ordering key of a device: backend domain name, then identifier.
    pub fn sort_key(&self, device: &Device, domains: &DomainRegistry) -> SortKey {
        SortKey::new(domains.name_of(&device.backend), device.ident.clone())
    }

    /// Devices of one category, sorted by [`SortKey`].
    pub fn list_by_category(&self, category: Category, domains: &DomainRegistry) -> Vec<&Device> {
        let mut keyed: Vec<(SortKey, &Device)> = self
            .devices
            .values()
            .filter(|d| d.category == category)
            .map(|d| (self.sort_key(d, domains), d))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.into_iter().map(|(_, d)| d).collect()
    }

    /// Ids of devices currently attached to `domain`, sorted.
    pub fn attached_to(&self, domain: &DomainId) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self
            .devices
            .values()
            .filter(|d| d.frontend.as_ref() == Some(domain))
            .map(|d| d.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// All device ids, sorted.
    pub fn ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.devices.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// `true` if `domain` may receive `device`: it is `Started`, it is not
    /// the device's backend, and it is not the controller domain.
    pub fn is_candidate(device: &Device, domain: &Domain, domains: &DomainRegistry) -> bool {
        domain.state == DomainState::Started
            && domain.id != device.backend
            && !domains.is_controller(domain)
    }

    /// Domains the device could be attached to, ordered by name.
    ///
    /// Returns an empty list for an unknown device.
    pub fn candidate_targets<'a>(
        &self,
        id: &DeviceId,
        domains: &'a DomainRegistry,
    ) -> Vec<&'a Domain> {
        let Some(device) = self.devices.get(id) else {
            return Vec::new();
        };
        domains
            .list()
            .into_iter()
            .filter(|d| Self::is_candidate(device, d, domains))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
