//! Shared utilities for heraldd
//!
//! This crate provides:
//! - ID types (NotificationId, ActionId, TodoId, RegistrationToken)
//! - Time utilities
//! - Error types
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
