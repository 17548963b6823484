//! Surface trait interfaces for heraldd
//!
//! The surface is where the user sees things: transient in-app alerts,
//! system-level notifications with action buttons, deep-link navigation, and
//! the notification permission prompt. This crate defines the seam; it
//! contains no platform code beyond a logging fallback.

mod capabilities;
mod log;
mod mock;
mod traits;
mod types;

pub use capabilities::*;
pub use log::*;
pub use mock::*;
pub use traits::*;
pub use types::*;
