//! Storage-layer types for database identity and metadata.
//!
//! [`DatabaseId`] lives here rather than in fgdb-core because a store only
//! gains an identity when it is persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a stored database.
///
/// The inner `i64` aligns with SQLite's `INTEGER PRIMARY KEY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatabaseId(pub i64);

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatabaseId({})", self.0)
    }
}

/// Summary of a stored database (for listing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSummary {
    pub id: DatabaseId,
    pub name: String,
    /// Number of saved snapshot generations.
    pub generations: u32,
}

/// Metadata of one saved snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationInfo {
    /// 1-based, increasing with every save.
    pub generation: u32,
    /// blake3 hex digest of the stored blob.
    pub checksum: String,
    pub bytes: usize,
}

impl GenerationInfo {
    pub(crate) fn for_blob(generation: u32, blob: &[u8]) -> Self {
        GenerationInfo {
            generation,
            checksum: checksum(blob),
            bytes: blob.len(),
        }
    }
}

/// Digest recorded next to every stored blob.
pub(crate) fn checksum(blob: &[u8]) -> String {
    blake3::hash(blob).to_hex().to_string()
}
