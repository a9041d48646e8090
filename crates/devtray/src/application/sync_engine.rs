//! SyncEngine: the single entry point for everything that changes the model.
//!
//! Platform notifications and user commands are fed to [`SyncEngine::handle`]
//! one at a time.  Each call runs to completion (including any platform
//! attach/detach it triggers) before the next input is accepted, so the
//! registries need no locking and per-device ordering is preserved.
//!
//! Every call returns a [`ChangeSet`]: the exact list of menu mutations the
//! presentation layer has to apply.  Errors never escape `handle`; stale
//! notifications are logged and ignored, platform failures were already
//! alerted to the user by the [`AssignmentController`].
//!
//! # Notification mapping
//!
//! | Notification              | Effect                                           |
//! |---------------------------|--------------------------------------------------|
//! | `DomainAdded/Removed`     | re-list domains, cascade removed and terminal ones, re-key renamed backends, re-sync every submenu |
//! | `DomainStateChanged`      | update state, add/remove candidates, cascade if terminal |
//! | `DeviceAdded`             | register, insert entry, open submenu, alert      |
//! | `DeviceRemoved`           | remove entry, close submenu, unregister, alert   |
//! | `DeviceAttached/Detached` | forced transition, relabel                       |

use std::sync::Arc;

use devtray_core::{
    AddOutcome, AssignmentState, CandidateMenus, CategoryIndex, ChangeSet, DeviceId, DeviceInfo,
    DeviceRegistry, Domain, DomainId, DomainRegistry, DomainState, MenuChange, Notification,
};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::application::assignment::{AssignmentController, AssignmentError, StateChange};
use crate::application::ports::{AlertSink, PlatformApi, PlatformError, Severity};

// ── Inputs ────────────────────────────────────────────────────────────────────

/// An action requested by the user from the tray menu.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum UserCommand {
    Attach { device: DeviceId, domain: DomainId },
    Detach { device: DeviceId },
    /// Activating a submenu entry: detach if attached there, attach otherwise.
    Toggle { device: DeviceId, domain: DomainId },
}

impl UserCommand {
    /// The device the command acts on.
    pub fn device(&self) -> &DeviceId {
        match self {
            UserCommand::Attach { device, .. }
            | UserCommand::Detach { device }
            | UserCommand::Toggle { device, .. } => device,
        }
    }
}

/// Anything the event loop can hand to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineInput {
    Notification(Notification),
    Command(UserCommand),
}

impl From<Notification> for EngineInput {
    fn from(notification: Notification) -> Self {
        EngineInput::Notification(notification)
    }
}

impl From<UserCommand> for EngineInput {
    fn from(command: UserCommand) -> Self {
        EngineInput::Command(command)
    }
}

/// Behaviour switches taken from configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Name of the privileged domain that never receives devices.
    pub controller_domain: String,
    /// Alert the user when a device appears or disappears.
    pub announce_devices: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            controller_domain: devtray_core::DEFAULT_CONTROLLER_DOMAIN.to_string(),
            announce_devices: true,
        }
    }
}

// ── Read-only view ────────────────────────────────────────────────────────────

/// Read-only access to the engine's model, for presenters and tests.
pub struct EngineView<'a> {
    pub domains: &'a DomainRegistry,
    pub devices: &'a DeviceRegistry,
    pub index: &'a CategoryIndex,
    pub menus: &'a CandidateMenus,
}

impl EngineView<'_> {
    /// Display name of a domain (its id when unknown).
    pub fn domain_name(&self, id: &DomainId) -> String {
        self.domains.name_of(id)
    }

    /// Colour label of a domain, used to pick its icon.
    pub fn domain_label(&self, id: &DomainId) -> Option<&str> {
        self.domains.get(id).map(|d| d.label.as_str())
    }

    /// Display name of a device (its id when unknown).
    pub fn device_name(&self, id: &DeviceId) -> String {
        self.devices
            .get(id)
            .map(|d| d.name().to_string())
            .unwrap_or_else(|| id.to_string())
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// Owns the model and applies inputs to it in order.
pub struct SyncEngine {
    domains: DomainRegistry,
    devices: DeviceRegistry,
    index: CategoryIndex,
    menus: CandidateMenus,
    controller: AssignmentController,
    platform: Arc<dyn PlatformApi>,
    alerts: Arc<dyn AlertSink>,
    settings: EngineSettings,
}

impl SyncEngine {
    /// Creates an engine with an empty model.  Call [`resync`](Self::resync)
    /// before handling any input.
    pub fn new(
        platform: Arc<dyn PlatformApi>,
        alerts: Arc<dyn AlertSink>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            domains: DomainRegistry::with_controller(settings.controller_domain.clone()),
            devices: DeviceRegistry::new(),
            index: CategoryIndex::new(),
            menus: CandidateMenus::new(),
            controller: AssignmentController::new(platform.clone(), alerts.clone()),
            platform,
            alerts,
            settings,
        }
    }

    pub fn view(&self) -> EngineView<'_> {
        EngineView {
            domains: &self.domains,
            devices: &self.devices,
            index: &self.index,
            menus: &self.menus,
        }
    }

    /// Rebuilds the whole model from a fresh platform listing.
    ///
    /// Any previous menu content is removed first, so the returned change-set
    /// takes the presentation from its current state to the new one.  No
    /// arrival alerts are raised.
    ///
    /// # Errors
    ///
    /// Returns the platform error if either listing fails; the model is left
    /// as it was.
    pub async fn resync(&mut self) -> Result<ChangeSet, PlatformError> {
        let domains = self.platform.list_domains().await?;
        let devices = self.platform.list_devices().await?;

        let mut changes = ChangeSet::new();
        for id in self.devices.ids() {
            changes.extend(self.index.remove(&id));
            self.menus.close(&id);
            if let Err(err) = self.devices.remove(&id) {
                warn!("{err}");
            }
        }

        self.domains.replace_all(domains);
        let mut added = 0;
        for info in devices {
            let (outcome, inserted) = self.insert_device(info);
            if matches!(outcome, AddOutcome::Added(_)) {
                added += 1;
            }
            changes.append(inserted);
        }
        info!(
            domains = self.domains.len(),
            devices = added,
            "model rebuilt from platform listing"
        );
        Ok(changes)
    }

    /// Applies one input and returns the resulting change-set.
    pub async fn handle(&mut self, input: EngineInput) -> ChangeSet {
        match input {
            EngineInput::Notification(notification) => self.handle_notification(notification).await,
            EngineInput::Command(command) => self.handle_command(command).await,
        }
    }

    /// Applies one platform notification.
    pub async fn handle_notification(&mut self, notification: Notification) -> ChangeSet {
        debug!(kind = notification.kind(), "handling notification");
        match notification {
            Notification::DomainAdded { domain } | Notification::DomainRemoved { domain } => {
                self.refresh_domains(&domain).await
            }
            Notification::DomainStateChanged { domain, state } => {
                self.domain_state_changed(&domain, state)
            }
            Notification::DeviceAdded { device } => self.device_added(device),
            Notification::DeviceRemoved { device } => self.device_removed(&device),
            Notification::DeviceAttached { device, domain } => {
                let result =
                    self.controller
                        .apply_attached(&mut self.devices, &self.domains, &device, &domain);
                Self::relabel_forced(result, &device)
            }
            Notification::DeviceDetached { device } => {
                let result = self.controller.apply_detached(&mut self.devices, &device);
                Self::relabel_forced(result, &device)
            }
        }
    }

    /// Applies one user command.
    pub async fn handle_command(&mut self, command: UserCommand) -> ChangeSet {
        debug!(?command, "handling command");
        let before = self.controller.state_of(&self.devices, command.device()).ok();
        let result = match &command {
            UserCommand::Attach { device, domain } => {
                self.controller
                    .request_attach(&mut self.devices, &self.domains, device, domain)
                    .await
            }
            UserCommand::Detach { device } => {
                self.controller
                    .request_detach(&mut self.devices, &self.domains, device)
                    .await
            }
            UserCommand::Toggle { device, domain } => {
                self.controller
                    .toggle(&mut self.devices, &self.domains, device, domain)
                    .await
            }
        };

        match result {
            Ok(state_changes) => state_changes.iter().map(relabel).collect::<Vec<_>>().into(),
            // Already alerted and logged by the controller.
            Err(AssignmentError::Platform(_)) => self.relabel_if_moved(command.device(), before),
            Err(err) => {
                warn!(?command, "command ignored: {err}");
                ChangeSet::new()
            }
        }
    }

    // ── Domains ───────────────────────────────────────────────────────────────

    async fn refresh_domains(&mut self, trigger: &DomainId) -> ChangeSet {
        let listing = match self.platform.list_domains().await {
            Ok(listing) => listing,
            Err(err) => {
                error!(domain = %trigger, "failed to re-list domains: {err}");
                return ChangeSet::new();
            }
        };

        let mut changes = ChangeSet::new();
        let diff = self.domains.replace_all(listing);
        for domain in &diff.removed {
            info!(domain = %domain, "domain removed");
            for change in self.controller.cascade_domain_down(&mut self.devices, domain) {
                changes.push(relabel(&change));
            }
        }
        for transition in &diff.transitions {
            info!(
                domain = %transition.domain,
                from = ?transition.previous,
                to = ?transition.current,
                "domain state changed in listing"
            );
            if transition.current.is_terminal() {
                for change in self
                    .controller
                    .cascade_domain_down(&mut self.devices, &transition.domain)
                {
                    changes.push(relabel(&change));
                }
            }
        }
        for domain in &diff.renamed {
            info!(domain = %domain, name = %self.domains.name_of(domain), "domain renamed");
        }
        changes.append(self.rekey_devices());
        changes.append(self.sync_all_menus());
        changes
    }

    fn domain_state_changed(&mut self, domain: &DomainId, state: DomainState) -> ChangeSet {
        let Some(transition) = self.domains.set_state(domain, state) else {
            if self.domains.get(domain).is_none() {
                warn!(domain = %domain, ?state, "state change for unknown domain");
            } else {
                debug!(domain = %domain, ?state, "domain state unchanged");
            }
            return ChangeSet::new();
        };
        info!(
            domain = %domain,
            from = ?transition.previous,
            to = ?transition.current,
            "domain state changed"
        );

        let mut changes = ChangeSet::new();
        if transition.became_started() {
            changes.append(self.add_candidate_everywhere(domain));
        } else if transition.left_started() {
            for device in self.devices.ids() {
                changes.extend(self.menus.remove_domain(&device, domain));
            }
        }
        if transition.became_terminal() {
            for change in self.controller.cascade_domain_down(&mut self.devices, domain) {
                changes.push(relabel(&change));
            }
        }
        changes
    }

    fn add_candidate_everywhere(&mut self, domain_id: &DomainId) -> ChangeSet {
        let mut changes = ChangeSet::new();
        let Some(domain) = self.domains.get(domain_id) else {
            return changes;
        };
        for device_id in self.devices.ids() {
            let Some(device) = self.devices.get(&device_id) else {
                continue;
            };
            if DeviceRegistry::is_candidate(device, domain, &self.domains) {
                changes.extend(self.menus.insert_domain(&device_id, domain));
            }
        }
        changes
    }

    fn sync_all_menus(&mut self) -> ChangeSet {
        let mut changes = ChangeSet::new();
        for device in self.devices.ids() {
            let targets: Vec<&Domain> = self.devices.candidate_targets(&device, &self.domains);
            changes.extend(self.menus.sync(&device, &targets));
        }
        changes
    }

    // ── Devices ───────────────────────────────────────────────────────────────

    fn device_added(&mut self, info: DeviceInfo) -> ChangeSet {
        let (outcome, changes) = self.insert_device(info);
        match outcome {
            AddOutcome::Added(id) => {
                info!(device = %id, "device added");
                if self.settings.announce_devices {
                    if let Some(device) = self.devices.get(&id) {
                        self.alerts.notify(
                            &format!("Device {} is available", device.name()),
                            Severity::Info,
                        );
                    }
                }
            }
            AddOutcome::AlreadyKnown(id) => debug!(device = %id, "duplicate device_added"),
            AddOutcome::Unrecognized(_) => {}
        }
        changes
    }

    /// Registers a device and emits its entry, submenu, and attachment label.
    ///
    /// A reported attachment to a domain that is unknown or not running is
    /// dropped, so the device enters the model detached.
    fn insert_device(&mut self, info: DeviceInfo) -> (AddOutcome, ChangeSet) {
        let outcome = self.devices.add(info);
        let AddOutcome::Added(id) = &outcome else {
            return (outcome, ChangeSet::new());
        };

        if let Some(frontend) = self.devices.get(id).and_then(|d| d.frontend.clone()) {
            let running = self
                .domains
                .get(&frontend)
                .is_some_and(|d| d.state == DomainState::Started);
            if !running {
                warn!(
                    device = %id,
                    domain = %frontend,
                    "device reported attached to a domain that is not running; treating as detached"
                );
                if let Err(err) = self.devices.set_frontend(id, None) {
                    warn!("{err}");
                }
            }
        }

        let changes = self.present_device(id);
        (outcome, changes)
    }

    /// Emits the menu entry, candidate submenu and attachment label of a
    /// registered device.
    fn present_device(&mut self, id: &DeviceId) -> ChangeSet {
        let mut changes = ChangeSet::new();
        let Some(device) = self.devices.get(id) else {
            return changes;
        };

        let key = self.devices.sort_key(device, &self.domains);
        changes.extend(self.index.insert(id.clone(), device.category, key));
        let targets = self.devices.candidate_targets(id, &self.domains);
        changes.extend(self.menus.open(id, &targets));
        if let Some(frontend) = &device.frontend {
            changes.push(MenuChange::Relabel {
                device: id.clone(),
                attached_to: Some(frontend.clone()),
            });
        }
        changes
    }

    /// Moves every entry whose backend name changed since it was indexed.
    fn rekey_devices(&mut self) -> ChangeSet {
        let mut changes = ChangeSet::new();
        for id in self.devices.ids() {
            let Some(device) = self.devices.get(&id) else {
                continue;
            };
            let key = self.devices.sort_key(device, &self.domains);
            if self.index.key_of(&id) == Some(&key) {
                continue;
            }
            debug!(device = %id, %key, "backend name changed; moving entry");
            changes.extend(self.index.remove(&id));
            self.menus.close(&id);
            changes.append(self.present_device(&id));
        }
        changes
    }

    fn device_removed(&mut self, id: &DeviceId) -> ChangeSet {
        if !self.devices.contains(id) {
            debug!(device = %id, "device_removed for unknown device");
            return ChangeSet::new();
        }
        let mut changes = ChangeSet::from(self.index.remove(id));
        self.menus.close(id);
        match self.devices.remove(id) {
            Ok(device) => {
                info!(device = %id, "device removed");
                if self.settings.announce_devices {
                    self.alerts.notify(
                        &format!("Device {} is removed", device.name()),
                        Severity::Info,
                    );
                }
            }
            Err(err) => {
                warn!("{err}");
                changes = ChangeSet::new();
            }
        }
        changes
    }

    /// A failed command can still have moved the device: the implicit
    /// detach went through and the attach was refused.
    fn relabel_if_moved(&self, device: &DeviceId, before: Option<AssignmentState>) -> ChangeSet {
        match self.controller.state_of(&self.devices, device) {
            Ok(now) if Some(&now) != before.as_ref() => {
                let attached_to = match now {
                    AssignmentState::Attached(domain) => Some(domain),
                    AssignmentState::Detached => None,
                };
                ChangeSet::from(vec![MenuChange::Relabel {
                    device: device.clone(),
                    attached_to,
                }])
            }
            _ => ChangeSet::new(),
        }
    }

    fn relabel_forced(
        result: Result<Option<StateChange>, AssignmentError>,
        device: &DeviceId,
    ) -> ChangeSet {
        match result {
            Ok(Some(change)) => ChangeSet::from(vec![relabel(&change)]),
            Ok(None) => {
                debug!(device = %device, "assignment already up to date");
                ChangeSet::new()
            }
            Err(err) => {
                warn!(device = %device, "ignoring stale notification: {err}");
                ChangeSet::new()
            }
        }
    }
}

fn relabel(change: &StateChange) -> MenuChange {
    MenuChange::Relabel {
        device: change.device.clone(),
        attached_to: change.attached_to().cloned(),
    }
}
