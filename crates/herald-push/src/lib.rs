//! Push pipeline for heraldd
//!
//! This crate provides:
//! - The backend todo API client (`TodoApi` seam + HTTP implementation)
//! - The push subscription manager (worker registration, permission flow,
//!   subscribe/unsubscribe)
//! - The push worker and its gateway transport
//! - The background action processor (push payloads and interactions)
//! - The background sync drain (offline action queue replay)

mod client;
mod drain;
mod processor;
mod subscription;
mod worker;

pub use client::*;
pub use drain::*;
pub use processor::*;
pub use subscription::*;
pub use worker::*;
