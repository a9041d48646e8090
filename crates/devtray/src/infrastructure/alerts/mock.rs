//! Recording alert sink for testing.

use std::sync::Mutex;

use crate::application::ports::{AlertSink, Severity};

/// An [`AlertSink`] that remembers every alert instead of showing it.
#[derive(Debug, Default)]
pub struct RecordingAlerts {
    sent: Mutex<Vec<(String, Severity)>>,
}

impl RecordingAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alert texts in the order they were raised.
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }

    /// Alerts with their severity.
    pub fn alerts(&self) -> Vec<(String, Severity)> {
        self.sent.lock().expect("lock poisoned").clone()
    }

    pub fn clear(&self) {
        self.sent.lock().expect("lock poisoned").clear();
    }
}

impl AlertSink for RecordingAlerts {
    fn notify(&self, text: &str, severity: Severity) {
        self.sent
            .lock()
            .expect("lock poisoned")
            .push((text.to_string(), severity));
    }
}
