//! SkyDrive file store API client.
//!
//! Covers the endpoints the resumable upload engine needs: dedup check,
//! transfer session init, chunk upload, merge, and the trash operations
//! used to replace an existing file safely.

pub mod client;
pub mod error;

pub use client::{Client, Timeouts};
pub use error::Error;
