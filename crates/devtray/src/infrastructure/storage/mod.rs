//! Storage infrastructure: configuration file loading.
//!
//! The widget keeps no state on disk; the model is rebuilt from the platform
//! at every start.  The only file it reads is its TOML configuration, handled
//! by the `config` sub-module:
//!
//! - Locating `config.toml` in the XDG config directory.
//! - Falling back to defaults when the file does not exist (first run).
//! - Filling in defaults for any field an older file does not mention.

pub mod config;
