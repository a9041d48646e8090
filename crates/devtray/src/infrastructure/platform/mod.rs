//! Platform adapters: how the widget talks to the virtualization platform.
//!
//! - **`cli`**  – The production adapter.  Shells out to the platform's
//!   `qvm-ls` and `qvm-device` tools and parses their text output.
//! - **`mock`** – A scriptable in-memory platform that records every call,
//!   for tests that need to prove which platform calls were (or were not)
//!   issued.

pub mod cli;
pub mod mock;

pub use cli::QubesCliPlatform;
