//! ocap-recorder-core: ingest-and-persist pipeline for the OCAP recording
//! extension.
//!
//! The host glue parses game-server callbacks into typed records and hands
//! them to the admission API. Admission is in-memory only; a single batched
//! writer persists what was admitted.
//!
//! # Architecture
//!
//! ```text
//! host callbacks → Backend (admission) → typed queues → BatchWriter → SQLite
//!                        ↓                                   ↓
//!            entity / marker caches  ←──── on-commit ids ────┘
//! ```
//!
//! # Modules
//!
//! - `recorder`: lifecycle controller (init, close, mission start/end)
//! - `storage`: backend trait, router, and the relational, local dump and
//!   null backends
//! - `queue`: per-kind FIFO queues drained by the writer
//! - `cache`: host object id and marker name translation
//! - `mission`: the active mission and world
//! - `probe`: store health flags consulted by admission and the writer
//! - `metrics`: writer timings and per-kind batch counters
//! - `model`: host-facing records
//! - `config`: TOML configuration
//! - `logging`: tracing subscriber setup
//! - `error`: error types
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod mission;
pub mod model;
pub mod probe;
pub mod queue;
pub mod recorder;
pub mod storage;

pub use error::{Error, Result, StorageError};
pub use recorder::Recorder;
pub use storage::{Backend, StorageBackend};

/// Version of the ocap-recorder-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
