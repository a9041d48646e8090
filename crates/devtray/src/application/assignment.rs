//! AssignmentController: the attach/detach state machine for devices.
//!
//! Each device is either `Detached` or `Attached(domain)`.  The controller
//! moves devices between those states in two ways:
//!
//! - **Requested** transitions ([`request_attach`], [`request_detach`],
//!   [`toggle`]) come from the user.  They check preconditions, call the
//!   platform, and only touch the model once the platform said yes.
//! - **Forced** transitions ([`apply_attached`], [`apply_detached`],
//!   [`cascade_domain_down`]) come from platform notifications.  The platform
//!   is authoritative, so these never call it back.
//!
//! A device is never attached "in place": attaching an already-attached
//! device first detaches it from its current domain.
//!
//! [`request_attach`]: AssignmentController::request_attach
//! [`request_detach`]: AssignmentController::request_detach
//! [`toggle`]: AssignmentController::toggle
//! [`apply_attached`]: AssignmentController::apply_attached
//! [`apply_detached`]: AssignmentController::apply_detached
//! [`cascade_domain_down`]: AssignmentController::cascade_domain_down

use std::sync::Arc;

use devtray_core::{
    Assignment, AssignmentState, Device, DeviceId, DeviceRegistry, DomainId, DomainRegistry,
    DomainState, NotFoundError,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::application::ports::{AlertSink, PlatformApi, PlatformError, Severity};

/// Why an attach or detach could not be carried out.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssignmentError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error("domain {0} is not running")]
    TargetNotRunning(DomainId),
    #[error("domain {0} is the device's backend")]
    TargetIsBackend(DomainId),
    #[error("domain {0} is the controller domain")]
    TargetIsController(DomainId),
    #[error("device {0} is not attached")]
    NotAttached(DeviceId),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// One device moving between assignment states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub device: DeviceId,
    pub from: AssignmentState,
    pub to: AssignmentState,
}

impl StateChange {
    /// The domain the device ended up attached to, if any.
    pub fn attached_to(&self) -> Option<&DomainId> {
        match &self.to {
            AssignmentState::Attached(domain) => Some(domain),
            AssignmentState::Detached => None,
        }
    }
}

/// Drives attach/detach requests against the platform and keeps the device
/// registry in step with the outcome.
pub struct AssignmentController {
    platform: Arc<dyn PlatformApi>,
    alerts: Arc<dyn AlertSink>,
}

impl AssignmentController {
    pub fn new(platform: Arc<dyn PlatformApi>, alerts: Arc<dyn AlertSink>) -> Self {
        Self { platform, alerts }
    }

    /// Current assignment state of a device.
    pub fn state_of(
        &self,
        devices: &DeviceRegistry,
        device: &DeviceId,
    ) -> Result<AssignmentState, NotFoundError> {
        devices
            .get(device)
            .map(Device::assignment_state)
            .ok_or_else(|| NotFoundError::device(device))
    }

    /// Attaches a device to `target`.
    ///
    /// If the device is attached elsewhere it is detached first; if that
    /// detach fails the attach is not attempted.  Requesting the domain the
    /// device is already attached to changes nothing.
    ///
    /// # Errors
    ///
    /// Precondition failures leave the model untouched and raise no alert.
    /// A platform failure is alerted to the user, logged, and returned.  When
    /// the implicit detach went through and only the attach was refused, the
    /// device stays detached; callers compare states to pick that up.
    pub async fn request_attach(
        &self,
        devices: &mut DeviceRegistry,
        domains: &DomainRegistry,
        device_id: &DeviceId,
        target: &DomainId,
    ) -> Result<Vec<StateChange>, AssignmentError> {
        let device = devices
            .get(device_id)
            .cloned()
            .ok_or_else(|| NotFoundError::device(device_id))?;
        let domain = domains
            .get(target)
            .ok_or_else(|| NotFoundError::domain(target))?;

        if domain.state != DomainState::Started {
            return Err(AssignmentError::TargetNotRunning(target.clone()));
        }
        if domain.id == device.backend {
            return Err(AssignmentError::TargetIsBackend(target.clone()));
        }
        if domains.is_controller(domain) {
            return Err(AssignmentError::TargetIsController(target.clone()));
        }

        let mut changes = Vec::new();
        match device.assignment_state() {
            AssignmentState::Attached(current) if &current == target => {
                debug!(device = %device_id, domain = %target, "already attached");
                return Ok(changes);
            }
            AssignmentState::Attached(_) => {
                changes.extend(self.request_detach(devices, domains, device_id).await?);
            }
            AssignmentState::Detached => {}
        }

        let target_name = domains.name_of(target);
        let assignment = Assignment::new(&device, target.clone());
        if let Err(err) = self.platform.attach(&assignment).await {
            self.report_failure("Attaching", "to", &device, &target_name, &err);
            return Err(err.into());
        }

        devices.set_frontend(device_id, Some(target.clone()))?;
        info!(device = %device_id, domain = %target_name, "device attached");
        self.alerts.notify(
            &format!("Attaching {} to {}", device.name(), target_name),
            Severity::Info,
        );
        changes.push(StateChange {
            device: device_id.clone(),
            from: AssignmentState::Detached,
            to: AssignmentState::Attached(target.clone()),
        });
        Ok(changes)
    }

    /// Detaches a device from the domain it is attached to.
    ///
    /// # Errors
    ///
    /// [`AssignmentError::NotAttached`] if the device is detached already.
    /// A platform failure is alerted, logged, and returned with the device
    /// still attached.
    pub async fn request_detach(
        &self,
        devices: &mut DeviceRegistry,
        domains: &DomainRegistry,
        device_id: &DeviceId,
    ) -> Result<Vec<StateChange>, AssignmentError> {
        let device = devices
            .get(device_id)
            .cloned()
            .ok_or_else(|| NotFoundError::device(device_id))?;
        let AssignmentState::Attached(current) = device.assignment_state() else {
            return Err(AssignmentError::NotAttached(device_id.clone()));
        };

        let current_name = domains.name_of(&current);
        let assignment = Assignment::new(&device, current.clone());
        if let Err(err) = self.platform.detach(&assignment).await {
            self.report_failure("Detaching", "from", &device, &current_name, &err);
            return Err(err.into());
        }

        devices.set_frontend(device_id, None)?;
        info!(device = %device_id, domain = %current_name, "device detached");
        self.alerts.notify(
            &format!("Detaching {} from {}", device.name(), current_name),
            Severity::Info,
        );
        Ok(vec![StateChange {
            device: device_id.clone(),
            from: AssignmentState::Attached(current),
            to: AssignmentState::Detached,
        }])
    }

    /// Activating a submenu entry: detach if the device is attached to
    /// `target`, otherwise attach it there.
    pub async fn toggle(
        &self,
        devices: &mut DeviceRegistry,
        domains: &DomainRegistry,
        device_id: &DeviceId,
        target: &DomainId,
    ) -> Result<Vec<StateChange>, AssignmentError> {
        match self.state_of(devices, device_id)? {
            AssignmentState::Attached(current) if &current == target => {
                self.request_detach(devices, domains, device_id).await
            }
            _ => self.request_attach(devices, domains, device_id, target).await,
        }
    }

    /// Forces a device into `Attached(domain)` after a platform notification.
    ///
    /// Returns `None` when the device was already attached there.  A device
    /// found attached to a different domain is an anomaly (a notification was
    /// missed); it is logged and corrected to the notified domain.
    ///
    /// # Errors
    ///
    /// Unknown device or domain, or a domain that is not running.  The model
    /// is left untouched.
    pub fn apply_attached(
        &self,
        devices: &mut DeviceRegistry,
        domains: &DomainRegistry,
        device_id: &DeviceId,
        domain: &DomainId,
    ) -> Result<Option<StateChange>, AssignmentError> {
        let known = domains
            .get(domain)
            .ok_or_else(|| NotFoundError::domain(domain))?;
        if known.state != DomainState::Started {
            return Err(AssignmentError::TargetNotRunning(domain.clone()));
        }

        let from = self.state_of(devices, device_id)?;
        match &from {
            AssignmentState::Attached(current) if current == domain => return Ok(None),
            AssignmentState::Attached(current) => {
                warn!(
                    device = %device_id,
                    was = %domains.name_of(current),
                    now = %known.name,
                    "device reported attached to two domains; trusting the notification"
                );
            }
            AssignmentState::Detached => {}
        }

        devices.set_frontend(device_id, Some(domain.clone()))?;
        Ok(Some(StateChange {
            device: device_id.clone(),
            from,
            to: AssignmentState::Attached(domain.clone()),
        }))
    }

    /// Forces a device into `Detached` after a platform notification.
    ///
    /// Returns `None` when the device was already detached.
    pub fn apply_detached(
        &self,
        devices: &mut DeviceRegistry,
        device_id: &DeviceId,
    ) -> Result<Option<StateChange>, AssignmentError> {
        let from = self.state_of(devices, device_id)?;
        if from == AssignmentState::Detached {
            return Ok(None);
        }
        devices.set_frontend(device_id, None)?;
        Ok(Some(StateChange {
            device: device_id.clone(),
            from,
            to: AssignmentState::Detached,
        }))
    }

    /// Detaches every device attached to a domain that went down.
    ///
    /// The platform already tore the attachments down with the domain, so no
    /// platform call is made and the user is not alerted.
    pub fn cascade_domain_down(
        &self,
        devices: &mut DeviceRegistry,
        domain: &DomainId,
    ) -> Vec<StateChange> {
        let mut changes = Vec::new();
        for device_id in devices.attached_to(domain) {
            if devices.set_frontend(&device_id, None).is_ok() {
                info!(device = %device_id, domain = %domain, "device detached with its domain");
                changes.push(StateChange {
                    device: device_id,
                    from: AssignmentState::Attached(domain.clone()),
                    to: AssignmentState::Detached,
                });
            }
        }
        changes
    }

    fn report_failure(
        &self,
        verb: &str,
        preposition: &str,
        device: &Device,
        domain_name: &str,
        err: &PlatformError,
    ) {
        if err.is_recoverable() {
            warn!(device = %device.id, domain = domain_name, "{verb} refused: {err}");
        } else {
            error!(device = %device.id, domain = domain_name, "{verb} failed: {err}");
        }
        self.alerts.notify(
            &format!(
                "{verb} device {} {preposition} {domain_name} failed. Error: {err}",
                device.name()
            ),
            Severity::Error,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockPlatformApi;
    use devtray_core::{DeviceInfo, Domain};
    use std::sync::Mutex;

    // ── Test doubles ──────────────────────────────────────────────────────────

    #[derive(Default)]
    struct RecordingAlerts {
        sent: Mutex<Vec<(String, Severity)>>,
    }

    impl RecordingAlerts {
        fn texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
        }
    }

    impl AlertSink for RecordingAlerts {
        fn notify(&self, text: &str, severity: Severity) {
            self.sent.lock().unwrap().push((text.to_string(), severity));
        }
    }

    // ── Fixtures ──────────────────────────────────────────────────────────────

    fn domain(name: &str, state: DomainState) -> Domain {
        Domain {
            id: DomainId::new(name),
            name: name.to_string(),
            state,
            label: "orange".to_string(),
        }
    }

    fn world() -> (DeviceRegistry, DomainRegistry) {
        let mut domains = DomainRegistry::new();
        domains.upsert(domain("dom0", DomainState::Started));
        domains.upsert(domain("work", DomainState::Started));
        domains.upsert(domain("personal", DomainState::Started));
        domains.upsert(domain("untrusted", DomainState::Started));
        domains.upsert(domain("vault", DomainState::Halted));

        let mut devices = DeviceRegistry::new();
        devices.add(DeviceInfo {
            backend: DomainId::new("work"),
            ident: "1234".to_string(),
            category: "usb".to_string(),
            display_name: "Camera".to_string(),
            frontend: None,
        });
        (devices, domains)
    }

    fn usb() -> DeviceId {
        DeviceId::new("work:1234")
    }

    fn controller(platform: MockPlatformApi) -> (AssignmentController, Arc<RecordingAlerts>) {
        let alerts = Arc::new(RecordingAlerts::default());
        (
            AssignmentController::new(Arc::new(platform), alerts.clone()),
            alerts,
        )
    }

    // ── Requested transitions ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_attach_succeeds_and_sets_frontend() {
        // Arrange
        let mut platform = MockPlatformApi::new();
        platform
            .expect_attach()
            .withf(|a| a.target == DomainId::new("personal") && a.ident == "1234")
            .times(1)
            .returning(|_| Ok(()));
        let (controller, alerts) = controller(platform);
        let (mut devices, domains) = world();

        // Act
        let changes = controller
            .request_attach(&mut devices, &domains, &usb(), &DomainId::new("personal"))
            .await
            .unwrap();

        // Assert
        assert_eq!(changes.len(), 1);
        assert_eq!(
            controller.state_of(&devices, &usb()).unwrap(),
            AssignmentState::Attached(DomainId::new("personal"))
        );
        assert_eq!(alerts.texts(), vec!["Attaching Camera to personal"]);
    }

    #[tokio::test]
    async fn test_attach_to_other_domain_detaches_first() {
        // Arrange
        let mut platform = MockPlatformApi::new();
        let mut seq = mockall::Sequence::new();
        platform
            .expect_detach()
            .withf(|a| a.target == DomainId::new("personal"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        platform
            .expect_attach()
            .withf(|a| a.target == DomainId::new("untrusted"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let (controller, _alerts) = controller(platform);
        let (mut devices, domains) = world();
        devices
            .set_frontend(&usb(), Some(DomainId::new("personal")))
            .unwrap();

        // Act
        let changes = controller
            .request_attach(&mut devices, &domains, &usb(), &DomainId::new("untrusted"))
            .await
            .unwrap();

        // Assert
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].to, AssignmentState::Detached);
        assert_eq!(
            changes[1].to,
            AssignmentState::Attached(DomainId::new("untrusted"))
        );
    }

    #[tokio::test]
    async fn test_refused_attach_after_detach_leaves_device_detached() {
        // Arrange: the detach from personal succeeds, the attach is refused.
        let mut platform = MockPlatformApi::new();
        platform.expect_detach().times(1).returning(|_| Ok(()));
        platform
            .expect_attach()
            .times(1)
            .returning(|_| Err(PlatformError::Rejected("policy denied".to_string())));
        let (controller, alerts) = controller(platform);
        let (mut devices, domains) = world();
        devices
            .set_frontend(&usb(), Some(DomainId::new("personal")))
            .unwrap();

        // Act
        let result = controller
            .request_attach(&mut devices, &domains, &usb(), &DomainId::new("untrusted"))
            .await;

        // Assert
        assert!(matches!(result, Err(AssignmentError::Platform(_))));
        assert_eq!(
            controller.state_of(&devices, &usb()).unwrap(),
            AssignmentState::Detached
        );
        assert_eq!(
            alerts.texts(),
            vec![
                "Detaching Camera from personal",
                "Attaching device Camera to untrusted failed. Error: policy denied",
            ]
        );
    }

    #[tokio::test]
    async fn test_attach_to_current_domain_is_noop() {
        let platform = MockPlatformApi::new();
        let (controller, alerts) = controller(platform);
        let (mut devices, domains) = world();
        devices
            .set_frontend(&usb(), Some(DomainId::new("personal")))
            .unwrap();

        let changes = controller
            .request_attach(&mut devices, &domains, &usb(), &DomainId::new("personal"))
            .await
            .unwrap();

        assert!(changes.is_empty());
        assert!(alerts.texts().is_empty());
    }

    #[tokio::test]
    async fn test_attach_preconditions_reject_without_platform_call() {
        // No expectations: any platform call would panic.
        let (controller, alerts) = controller(MockPlatformApi::new());
        let (mut devices, domains) = world();

        let halted = controller
            .request_attach(&mut devices, &domains, &usb(), &DomainId::new("vault"))
            .await;
        let backend = controller
            .request_attach(&mut devices, &domains, &usb(), &DomainId::new("work"))
            .await;
        let dom0 = controller
            .request_attach(&mut devices, &domains, &usb(), &DomainId::new("dom0"))
            .await;
        let ghost = controller
            .request_attach(&mut devices, &domains, &usb(), &DomainId::new("ghost"))
            .await;

        assert_eq!(
            halted,
            Err(AssignmentError::TargetNotRunning(DomainId::new("vault")))
        );
        assert_eq!(
            backend,
            Err(AssignmentError::TargetIsBackend(DomainId::new("work")))
        );
        assert_eq!(
            dom0,
            Err(AssignmentError::TargetIsController(DomainId::new("dom0")))
        );
        assert!(matches!(ghost, Err(AssignmentError::NotFound(_))));
        assert!(alerts.texts().is_empty());
        assert_eq!(
            controller.state_of(&devices, &usb()).unwrap(),
            AssignmentState::Detached
        );
    }

    #[tokio::test]
    async fn test_rejected_attach_keeps_detached_and_alerts_reason() {
        // Arrange
        let mut platform = MockPlatformApi::new();
        platform
            .expect_attach()
            .times(1)
            .returning(|_| Err(PlatformError::Rejected("Device busy".to_string())));
        let (controller, alerts) = controller(platform);
        let (mut devices, domains) = world();

        // Act
        let result = controller
            .request_attach(&mut devices, &domains, &usb(), &DomainId::new("personal"))
            .await;

        // Assert
        assert_eq!(
            result,
            Err(AssignmentError::Platform(PlatformError::Rejected(
                "Device busy".to_string()
            )))
        );
        assert_eq!(
            controller.state_of(&devices, &usb()).unwrap(),
            AssignmentState::Detached
        );
        assert_eq!(
            alerts.texts(),
            vec!["Attaching device Camera to personal failed. Error: Device busy"]
        );
    }

    #[tokio::test]
    async fn test_unavailable_platform_on_detach_keeps_attachment() {
        let mut platform = MockPlatformApi::new();
        platform
            .expect_detach()
            .times(1)
            .returning(|_| Err(PlatformError::Unavailable("qvm-device missing".to_string())));
        let (controller, alerts) = controller(platform);
        let (mut devices, domains) = world();
        devices
            .set_frontend(&usb(), Some(DomainId::new("personal")))
            .unwrap();

        let result = controller
            .request_detach(&mut devices, &domains, &usb())
            .await;

        assert!(result.is_err());
        assert_eq!(
            controller.state_of(&devices, &usb()).unwrap(),
            AssignmentState::Attached(DomainId::new("personal"))
        );
        assert_eq!(alerts.texts().len(), 1);
        assert!(alerts.texts()[0].starts_with("Detaching device Camera from personal failed."));
    }

    #[tokio::test]
    async fn test_detach_when_detached_is_rejected() {
        let (controller, _alerts) = controller(MockPlatformApi::new());
        let (mut devices, domains) = world();

        let result = controller
            .request_detach(&mut devices, &domains, &usb())
            .await;

        assert_eq!(result, Err(AssignmentError::NotAttached(usb())));
    }

    #[tokio::test]
    async fn test_toggle_on_attached_entry_detaches() {
        let mut platform = MockPlatformApi::new();
        platform.expect_detach().times(1).returning(|_| Ok(()));
        platform.expect_attach().times(0);
        let (controller, alerts) = controller(platform);
        let (mut devices, domains) = world();
        devices
            .set_frontend(&usb(), Some(DomainId::new("personal")))
            .unwrap();

        controller
            .toggle(&mut devices, &domains, &usb(), &DomainId::new("personal"))
            .await
            .unwrap();

        assert_eq!(
            controller.state_of(&devices, &usb()).unwrap(),
            AssignmentState::Detached
        );
        assert_eq!(alerts.texts(), vec!["Detaching Camera from personal"]);
    }

    // ── Forced transitions ────────────────────────────────────────────────────

    #[test]
    fn test_apply_attached_twice_is_idempotent() {
        let (controller, _alerts) = controller(MockPlatformApi::new());
        let (mut devices, domains) = world();
        let personal = DomainId::new("personal");

        let first = controller
            .apply_attached(&mut devices, &domains, &usb(), &personal)
            .unwrap();
        let second = controller
            .apply_attached(&mut devices, &domains, &usb(), &personal)
            .unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(
            controller.state_of(&devices, &usb()).unwrap(),
            AssignmentState::Attached(personal)
        );
    }

    #[test]
    fn test_apply_attached_elsewhere_corrects_to_notified_domain() {
        let (controller, _alerts) = controller(MockPlatformApi::new());
        let (mut devices, domains) = world();
        devices
            .set_frontend(&usb(), Some(DomainId::new("personal")))
            .unwrap();

        let change = controller
            .apply_attached(&mut devices, &domains, &usb(), &DomainId::new("untrusted"))
            .unwrap()
            .unwrap();

        assert_eq!(
            change.from,
            AssignmentState::Attached(DomainId::new("personal"))
        );
        assert_eq!(change.attached_to(), Some(&DomainId::new("untrusted")));
    }

    #[test]
    fn test_apply_attached_to_halted_domain_is_ignored() {
        let (controller, _alerts) = controller(MockPlatformApi::new());
        let (mut devices, domains) = world();

        let result = controller.apply_attached(&mut devices, &domains, &usb(), &DomainId::new("vault"));

        assert!(matches!(result, Err(AssignmentError::TargetNotRunning(_))));
        assert_eq!(
            controller.state_of(&devices, &usb()).unwrap(),
            AssignmentState::Detached
        );
    }

    #[test]
    fn test_apply_detached_unknown_device_is_not_found() {
        let (controller, _alerts) = controller(MockPlatformApi::new());
        let (mut devices, _domains) = world();

        let result = controller.apply_detached(&mut devices, &DeviceId::new("ghost:1"));

        assert!(matches!(result, Err(AssignmentError::NotFound(_))));
    }

    #[test]
    fn test_cascade_detaches_without_platform_call_or_alert() {
        // Arrange: a mock with no expectations panics on any call.
        let (controller, alerts) = controller(MockPlatformApi::new());
        let (mut devices, _domains) = world();
        devices.add(DeviceInfo {
            backend: DomainId::new("work"),
            ident: "sdb".to_string(),
            category: "block".to_string(),
            display_name: String::new(),
            frontend: Some(DomainId::new("personal")),
        });
        devices
            .set_frontend(&usb(), Some(DomainId::new("personal")))
            .unwrap();

        // Act
        let changes = controller.cascade_domain_down(&mut devices, &DomainId::new("personal"));

        // Assert
        assert_eq!(changes.len(), 2);
        assert!(devices.attached_to(&DomainId::new("personal")).is_empty());
        assert!(alerts.texts().is_empty());
    }
}
