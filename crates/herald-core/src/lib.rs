//! Core pipeline for heraldd
//!
//! This crate provides:
//! - Reconnection backoff policy
//! - SSE wire decoding
//! - The connection manager actor (event stream lifecycle)
//! - The notification router
//! - Network connectivity monitoring

mod backoff;
mod connection;
mod connectivity;
mod router;
mod sse;

pub use backoff::*;
pub use connection::*;
pub use connectivity::*;
pub use router::*;
pub use sse::*;
