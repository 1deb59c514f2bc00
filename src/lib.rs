//! Astralog - Astrophotography Session Log
//!
//! Core engine for a session-tracking dashboard: an in-memory catalogue of
//! celestial objects, imaging projects and sessions, pure derived-statistics
//! computation, and a dual-sink (local + remote cloud) persistence
//! coordinator with debounced writes.

pub mod catalog;
pub mod error;
pub mod model;
pub mod stats;
pub mod sync;
pub mod transfer;

pub use catalog::Catalog;
pub use error::{Error, Result};
pub use stats::StatsSnapshot;
pub use sync::{SyncConfig, SyncCoordinator};

/// Initialize logging from the environment, defaulting to `info`.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Crate name and version, for an about box.
pub fn app_info() -> (&'static str, &'static str) {
    ("Astralog", env!("CARGO_PKG_VERSION"))
}
