//! The [`SnapshotStore`] trait defining the storage contract for fgdb stores.
//!
//! Two-layer API design:
//! - **Blob-level** methods form the trait foundation. Backends only move
//!   opaque snapshot blobs and their metadata around; every save appends a
//!   new generation and nothing is overwritten.
//! - **Store-level** methods (`save`, `load`, `load_generation`) are provided
//!   on top of them and run the fgdb-core snapshot codec, so every backend
//!   restores through the same validation.

use fgdb_core::{FunctionalGraph, StoreConfig};
use tracing::debug;

use crate::error::StorageError;
use crate::types::{checksum, DatabaseId, DatabaseSummary, GenerationInfo};

/// The storage contract for functional graph stores.
///
/// The trait is synchronous, matching the single-writer store model.
pub trait SnapshotStore {
    // -------------------------------------------------------------------
    // Database-level operations
    // -------------------------------------------------------------------

    /// Creates a new empty database with the given name.
    ///
    /// Fails with [`StorageError::DuplicateName`] if the name is taken.
    fn create_database(&mut self, name: &str) -> Result<DatabaseId, StorageError>;

    /// Looks a database up by name.
    fn find_database(&self, name: &str) -> Result<Option<DatabaseId>, StorageError>;

    /// Lists all stored databases, ordered by ID.
    fn list_databases(&self) -> Result<Vec<DatabaseSummary>, StorageError>;

    /// Deletes a database and all of its generations.
    fn delete_database(&mut self, id: DatabaseId) -> Result<(), StorageError>;

    // -------------------------------------------------------------------
    // Blob-level operations
    // -------------------------------------------------------------------

    /// Appends `blob` as the next generation of `id`.
    fn save_blob(&mut self, id: DatabaseId, blob: &[u8]) -> Result<GenerationInfo, StorageError>;

    /// Reads one generation back, verifying its recorded checksum.
    fn blob_at(&self, id: DatabaseId, generation: u32) -> Result<Vec<u8>, StorageError>;

    /// All generations of `id`, oldest first.
    fn generations(&self, id: DatabaseId) -> Result<Vec<GenerationInfo>, StorageError>;

    // -------------------------------------------------------------------
    // Store-level convenience methods
    // -------------------------------------------------------------------

    /// Snapshots `store` into a new generation of `id`.
    fn save(&mut self, id: DatabaseId, store: &FunctionalGraph) -> Result<GenerationInfo, StorageError> {
        let blob = store.snapshot()?;
        let info = self.save_blob(id, &blob)?;
        debug!("saved {} generation {} ({} bytes)", id, info.generation, info.bytes);
        Ok(info)
    }

    /// Restores the newest generation of `id`. A database that was never
    /// saved loads as an empty store.
    fn load(&self, id: DatabaseId) -> Result<FunctionalGraph, StorageError> {
        self.load_with_config(id, StoreConfig::default())
    }

    fn load_with_config(
        &self,
        id: DatabaseId,
        config: StoreConfig,
    ) -> Result<FunctionalGraph, StorageError> {
        match self.generations(id)?.last() {
            Some(latest) => {
                let blob = self.blob_at(id, latest.generation)?;
                Ok(FunctionalGraph::restore_with_config(&blob, config)?)
            }
            None => Ok(FunctionalGraph::with_config(config)),
        }
    }

    /// Restores a specific, possibly older, generation of `id`.
    fn load_generation(
        &self,
        id: DatabaseId,
        generation: u32,
    ) -> Result<FunctionalGraph, StorageError> {
        self.load_generation_with_config(id, generation, StoreConfig::default())
    }

    fn load_generation_with_config(
        &self,
        id: DatabaseId,
        generation: u32,
        config: StoreConfig,
    ) -> Result<FunctionalGraph, StorageError> {
        let blob = self.blob_at(id, generation)?;
        Ok(FunctionalGraph::restore_with_config(&blob, config)?)
    }
}

/// Checks a blob read back from a backend against its recorded digest.
pub(crate) fn verify_blob(
    id: DatabaseId,
    generation: u32,
    recorded: &str,
    blob: &[u8],
) -> Result<(), StorageError> {
    if checksum(blob) != recorded {
        return Err(StorageError::IntegrityError {
            reason: format!("{} generation {} does not match its checksum", id, generation),
        });
    }
    Ok(())
}
