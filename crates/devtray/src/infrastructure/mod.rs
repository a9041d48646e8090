//! Infrastructure layer for the tray widget.
//!
//! Contains the adapters behind the application ports: the platform's
//! command-line tools, desktop notifications, the notification feed on
//! standard input, the menu presenter, and configuration storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `devtray_core`, but MUST NOT be imported by the `application` layer.

pub mod alerts;
pub mod feed;
pub mod platform;
pub mod presentation;
pub mod storage;
