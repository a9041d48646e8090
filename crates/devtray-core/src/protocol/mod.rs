//! The vocabulary at the edges of the model.
//!
//! - **`notification`** – what the platform tells the widget (already decoded
//!   by the transport; the core never sees bytes).
//! - **`changes`** – what the widget tells the presentation layer to do.

pub mod changes;
pub mod notification;
