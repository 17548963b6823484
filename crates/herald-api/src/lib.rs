//! Wire and domain types for heraldd
//!
//! This crate defines the stable shapes shared across the pipeline:
//! - Notifications (history entries and their wire payloads)
//! - Pending offline actions
//! - Push subscription records
//! - Event stream frames

mod actions;
mod notifications;
mod push;
mod stream;

pub use actions::*;
pub use notifications::*;
pub use push::*;
pub use stream::*;
