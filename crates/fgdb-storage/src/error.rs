//! Storage error types for fgdb-storage.
//!
//! [`StorageError`] covers the failure modes of the persistence layer:
//! backend errors, missing databases or generations, integrity violations,
//! and snapshot restore failures passed through from fgdb-core.

use fgdb_core::CoreError;
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A snapshot could not be encoded or restored.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The SQLite backend failed.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// A database with the given ID was not found.
    #[error("database not found: {0}")]
    DatabaseNotFound(i64),

    /// A database with the given name already exists.
    #[error("database name already in use: '{0}'")]
    DuplicateName(String),

    /// A generation was not found in the given database.
    #[error("generation not found: database={database}, generation={generation}")]
    GenerationNotFound { database: i64, generation: u32 },

    /// A data integrity violation was detected.
    #[error("integrity error: {reason}")]
    IntegrityError { reason: String },
}
