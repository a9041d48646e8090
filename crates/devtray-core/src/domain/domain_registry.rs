//! DomainRegistry: the widget's in-memory view of every known domain.
//!
//! Each entry tracks a domain's name, colour label and lifecycle state:
//!
//! ```text
//! Starting  ──►  Started  ──►  Halted
//!                   │
//!                   ├──────►  Failed
//!                   └──────►  Unknown
//! ```
//!
//! - `Started` is the only state in which a domain can receive a device.
//! - `Halted`, `Failed` and `Unknown` are *terminal*: the platform has torn
//!   down every attachment to the domain.  [`DomainRegistry::set_state`]
//!   returns a [`StateTransition`] so the caller can cascade the detach.
//!
//! The registry never fails on unknown ids: lookups return `None`.

use std::collections::HashMap;

use crate::domain::model::{Domain, DomainId, DomainState};

/// Name of the privileged management domain when none is configured.
pub const DEFAULT_CONTROLLER_DOMAIN: &str = "dom0";

/// Result of a state change on a known domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub domain: DomainId,
    pub previous: DomainState,
    pub current: DomainState,
}

impl StateTransition {
    /// `true` when the domain just left a non-terminal state for a terminal one.
    pub fn became_terminal(&self) -> bool {
        self.current.is_terminal() && !self.previous.is_terminal()
    }

    /// `true` when the domain just reached `Started`.
    pub fn became_started(&self) -> bool {
        self.current == DomainState::Started && self.previous != DomainState::Started
    }

    /// `true` when the domain was `Started` and no longer is.
    pub fn left_started(&self) -> bool {
        self.previous == DomainState::Started && self.current != DomainState::Started
    }
}

/// What changed between two full domain listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingDiff {
    /// Known before, absent now.
    pub removed: Vec<DomainId>,
    /// Present in both listings with a different state.
    pub transitions: Vec<StateTransition>,
    /// Present in both listings under a different name.
    pub renamed: Vec<DomainId>,
}

/// In-memory registry of all known domains.
///
/// A `HashMap<DomainId, Domain>` gives O(1) lookup.  Iteration order is not
/// guaranteed, so [`list`](Self::list) sorts by name before returning.
#[derive(Debug)]
pub struct DomainRegistry {
    domains: HashMap<DomainId, Domain>,
    controller: String,
}

impl Default for DomainRegistry {
    fn default() -> Self {
        Self::with_controller(DEFAULT_CONTROLLER_DOMAIN)
    }
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry that treats `controller` as the privileged
    /// domain (never a valid attach target).
    pub fn with_controller(controller: impl Into<String>) -> Self {
        Self {
            domains: HashMap::new(),
            controller: controller.into(),
        }
    }

    /// Registers or replaces a domain, returning the previous entry.
    pub fn upsert(&mut self, domain: Domain) -> Option<Domain> {
        self.domains.insert(domain.id.clone(), domain)
    }

    /// Removes a domain from the registry.
    pub fn remove(&mut self, id: &DomainId) -> Option<Domain> {
        self.domains.remove(id)
    }

    /// Updates the lifecycle state of a known domain.
    ///
    /// Returns `None` for an unknown id or when the state did not change.
    pub fn set_state(&mut self, id: &DomainId, state: DomainState) -> Option<StateTransition> {
        let domain = self.domains.get_mut(id)?;
        if domain.state == state {
            return None;
        }
        let previous = domain.state;
        domain.state = state;
        Some(StateTransition {
            domain: id.clone(),
            previous,
            current: state,
        })
    }

    pub fn get(&self, id: &DomainId) -> Option<&Domain> {
        self.domains.get(id)
    }

    /// Returns every known domain ordered by name (ties broken by id).
    pub fn list(&self) -> Vec<&Domain> {
        let mut all: Vec<&Domain> = self.domains.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// Replaces the whole registry with a fresh listing from the platform.
    ///
    /// Reports the ids that disappeared and the state transitions of the
    /// domains present in both listings.
    pub fn replace_all(&mut self, domains: Vec<Domain>) -> ListingDiff {
        let mut fresh: HashMap<DomainId, Domain> = domains
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();

        let mut diff = ListingDiff::default();
        for (id, old) in &self.domains {
            let Some(new) = fresh.get(id) else {
                diff.removed.push(id.clone());
                continue;
            };
            if new.state != old.state {
                diff.transitions.push(StateTransition {
                    domain: id.clone(),
                    previous: old.state,
                    current: new.state,
                });
            }
            if new.name != old.name {
                diff.renamed.push(id.clone());
            }
        }
        diff.removed.sort();
        diff.transitions.sort_by(|a, b| a.domain.cmp(&b.domain));
        diff.renamed.sort();
        std::mem::swap(&mut self.domains, &mut fresh);
        diff
    }

    /// `true` if `domain` is the privileged controller domain.
    pub fn is_controller(&self, domain: &Domain) -> bool {
        domain.name == self.controller
    }

    pub fn controller_name(&self) -> &str {
        &self.controller
    }

    /// Name of a domain, falling back to its id when unknown.
    pub fn name_of(&self, id: &DomainId) -> String {
        self.domains
            .get(id)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}
