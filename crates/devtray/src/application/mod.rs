//! Application layer use cases for the tray widget.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The application layer sits between the pure model in `devtray_core` and
//! the infrastructure adapters (command-line tools, desktop notifications,
//! standard input).  Code here:
//!
//! - **Orchestrates** the registries and the menu index to react to one
//!   notification or one user command at a time.
//! - **Depends on abstractions** (the traits in [`ports`]) rather than on
//!   concrete adapters, so tests can swap in recording fakes or mocks.
//! - **Performs no direct I/O**; every side effect goes through a port.
//!
//! # Sub-modules
//!
//! - **`ports`**      – The traits the application needs from the outside
//!   world: the platform API, the user alert sink, and the presentation sink.
//!
//! - **`assignment`** – The attach/detach state machine for a single device,
//!   including the implicit detach before attach and the cascade when a
//!   domain goes down.
//!
//! - **`sync_engine`** – The single entry point for every notification and
//!   command.  Applies them one at a time and returns the change-set the
//!   presentation layer must apply.

pub mod assignment;
pub mod ports;
pub mod sync_engine;
