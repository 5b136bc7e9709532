//! Snapshot persistence for fgdb stores.
//!
//! Provides the [`SnapshotStore`] trait defining the storage contract that all
//! backends implement, plus [`InMemoryStore`] and [`SqliteStore`] as
//! first-class backends. Backends store opaque, checksummed snapshot blobs
//! produced by `fgdb_core::FunctionalGraph::snapshot`, one generation per
//! save.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: DatabaseId, DatabaseSummary, GenerationInfo
//! - [`traits`]: SnapshotStore trait definition
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: migration setup for SQLite
//! - [`sqlite`]: SqliteStore implementation
//! - [`config`]: StorageConfig read from the environment

pub mod config;
pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic use.
pub use config::StorageConfig;
pub use error::StorageError;
pub use memory::InMemoryStore;
pub use sqlite::{open_from_config, SqliteStore};
pub use traits::SnapshotStore;
pub use types::{DatabaseId, DatabaseSummary, GenerationInfo};
