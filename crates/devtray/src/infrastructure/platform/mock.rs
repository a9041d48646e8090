//! Scriptable in-memory platform for testing.
//!
//! Tests set the listings the platform returns, optionally queue a failure
//! for the next attach/detach, and afterwards inspect every call that was
//! made, without any `qvm-*` tool installed.

use std::sync::Mutex;

use async_trait::async_trait;
use devtray_core::{Assignment, DeviceInfo, Domain};

use crate::application::ports::{PlatformApi, PlatformError};

/// A call received by [`RecordingPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    ListDomains,
    ListDevices,
    Attach(Assignment),
    Detach(Assignment),
}

/// A [`PlatformApi`] that answers from memory and records its calls.
#[derive(Default)]
pub struct RecordingPlatform {
    domains: Mutex<Vec<Domain>>,
    devices: Mutex<Vec<DeviceInfo>>,
    calls: Mutex<Vec<PlatformCall>>,
    fail_next: Mutex<Option<PlatformError>>,
    fail_next_attach: Mutex<Option<PlatformError>>,
    unavailable: Mutex<bool>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets what `list_domains` returns from now on.
    pub fn set_domains(&self, domains: Vec<Domain>) {
        *self.domains.lock().expect("lock poisoned") = domains;
    }

    /// Sets what `list_devices` returns from now on.
    pub fn set_devices(&self, devices: Vec<DeviceInfo>) {
        *self.devices.lock().expect("lock poisoned") = devices;
    }

    /// Makes the next attach or detach fail with `error`.
    pub fn fail_next(&self, error: PlatformError) {
        *self.fail_next.lock().expect("lock poisoned") = Some(error);
    }

    /// Makes the next attach fail with `error`; detaches are unaffected.
    pub fn fail_next_attach(&self, error: PlatformError) {
        *self.fail_next_attach.lock().expect("lock poisoned") = Some(error);
    }

    /// Makes every call fail with [`PlatformError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().expect("lock poisoned") = unavailable;
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    /// Only the attach and detach calls received so far.
    pub fn assignment_calls(&self) -> Vec<PlatformCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, PlatformCall::Attach(_) | PlatformCall::Detach(_)))
            .collect()
    }

    fn record(&self, call: PlatformCall) -> Result<(), PlatformError> {
        self.calls.lock().expect("lock poisoned").push(call);
        if *self.unavailable.lock().expect("lock poisoned") {
            return Err(PlatformError::Unavailable("recording platform offline".to_string()));
        }
        Ok(())
    }

    fn take_failure(&self) -> Result<(), PlatformError> {
        match self.fail_next.lock().expect("lock poisoned").take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PlatformApi for RecordingPlatform {
    async fn list_domains(&self) -> Result<Vec<Domain>, PlatformError> {
        self.record(PlatformCall::ListDomains)?;
        Ok(self.domains.lock().expect("lock poisoned").clone())
    }

    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, PlatformError> {
        self.record(PlatformCall::ListDevices)?;
        Ok(self.devices.lock().expect("lock poisoned").clone())
    }

    async fn attach(&self, assignment: &Assignment) -> Result<(), PlatformError> {
        self.record(PlatformCall::Attach(assignment.clone()))?;
        if let Some(err) = self.fail_next_attach.lock().expect("lock poisoned").take() {
            return Err(err);
        }
        self.take_failure()
    }

    async fn detach(&self, assignment: &Assignment) -> Result<(), PlatformError> {
        self.record(PlatformCall::Detach(assignment.clone()))?;
        self.take_failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devtray_core::{Category, DeviceId, DomainId};

    fn assignment() -> Assignment {
        Assignment {
            device: DeviceId::new("sys-usb:2-1"),
            category: Category::Usb,
            backend: DomainId::new("sys-usb"),
            ident: "2-1".to_string(),
            target: DomainId::new("work"),
        }
    }

    #[tokio::test]
    async fn test_recording_platform_records_calls_in_order() {
        // Arrange
        let platform = RecordingPlatform::new();

        // Act
        platform.list_domains().await.unwrap();
        platform.attach(&assignment()).await.unwrap();
        platform.detach(&assignment()).await.unwrap();

        // Assert
        assert_eq!(
            platform.calls(),
            vec![
                PlatformCall::ListDomains,
                PlatformCall::Attach(assignment()),
                PlatformCall::Detach(assignment()),
            ]
        );
        assert_eq!(platform.assignment_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_fail_next_applies_once() {
        let platform = RecordingPlatform::new();
        platform.fail_next(PlatformError::Rejected("busy".to_string()));

        assert!(platform.attach(&assignment()).await.is_err());
        assert!(platform.attach(&assignment()).await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_next_attach_skips_detach() {
        let platform = RecordingPlatform::new();
        platform.fail_next_attach(PlatformError::Rejected("denied".to_string()));

        assert!(platform.detach(&assignment()).await.is_ok());
        assert!(platform.attach(&assignment()).await.is_err());
        assert!(platform.attach(&assignment()).await.is_ok());
    }

    #[tokio::test]
    async fn test_unavailable_platform_fails_listing() {
        let platform = RecordingPlatform::new();
        platform.set_unavailable(true);

        let result = platform.list_devices().await;

        assert!(matches!(result, Err(PlatformError::Unavailable(_))));
    }
}
