//! SQLite implementation of [`SnapshotStore`].
//!
//! [`SqliteStore`] persists snapshot generations in a SQLite database with
//! WAL mode, a transaction around every write, and automatic schema
//! migrations. Generations are append-only: saving never rewrites an
//! existing row.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::traits::{verify_blob, SnapshotStore};
use crate::types::{DatabaseId, DatabaseSummary, GenerationInfo};

/// SQLite-backed implementation of [`SnapshotStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }

    fn assert_database_exists(&self, id: DatabaseId) -> Result<(), StorageError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM databases WHERE id = ?1)",
            params![id.0],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StorageError::DatabaseNotFound(id.0));
        }
        Ok(())
    }
}

/// Opens the SQLite file named by `config` and returns the configured
/// database, creating it on first use.
pub fn open_from_config(config: &StorageConfig) -> Result<(SqliteStore, DatabaseId), StorageError> {
    let mut store = SqliteStore::new(&config.db_path)?;
    let id = match store.find_database(&config.database)? {
        Some(id) => id,
        None => {
            let id = store.create_database(&config.database)?;
            info!("created database '{}' in {}", config.database, config.db_path);
            id
        }
    };
    Ok((store, id))
}

impl SnapshotStore for SqliteStore {
    // -------------------------------------------------------------------
    // Database-level operations
    // -------------------------------------------------------------------

    fn create_database(&mut self, name: &str) -> Result<DatabaseId, StorageError> {
        if self.find_database(name)?.is_some() {
            return Err(StorageError::DuplicateName(name.to_string()));
        }
        let tx = self.conn.transaction()?;
        tx.execute("INSERT INTO databases (name) VALUES (?1)", params![name])?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(DatabaseId(id))
    }

    fn find_database(&self, name: &str) -> Result<Option<DatabaseId>, StorageError> {
        let id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM databases WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(DatabaseId))
    }

    fn list_databases(&self) -> Result<Vec<DatabaseSummary>, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT d.id, d.name, COUNT(s.generation)
             FROM databases d LEFT JOIN snapshots s ON s.database_id = d.id
             GROUP BY d.id ORDER BY d.id",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let name: String = row.get(1)?;
            let generations: i64 = row.get(2)?;
            Ok(DatabaseSummary {
                id: DatabaseId(id),
                name,
                generations: generations as u32,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn delete_database(&mut self, id: DatabaseId) -> Result<(), StorageError> {
        self.assert_database_exists(id)?;
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM snapshots WHERE database_id = ?1", params![id.0])?;
        tx.execute("DELETE FROM databases WHERE id = ?1", params![id.0])?;
        tx.commit()?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Blob-level operations
    // -------------------------------------------------------------------

    fn save_blob(&mut self, id: DatabaseId, blob: &[u8]) -> Result<GenerationInfo, StorageError> {
        self.assert_database_exists(id)?;
        let tx = self.conn.transaction()?;
        let latest: i64 = tx.query_row(
            "SELECT COALESCE(MAX(generation), 0) FROM snapshots WHERE database_id = ?1",
            params![id.0],
            |row| row.get(0),
        )?;
        let info = GenerationInfo::for_blob(latest as u32 + 1, blob);
        tx.execute(
            "INSERT INTO snapshots (database_id, generation, checksum, blob)
             VALUES (?1, ?2, ?3, ?4)",
            params![id.0, info.generation, info.checksum, blob],
        )?;
        tx.commit()?;
        Ok(info)
    }

    fn blob_at(&self, id: DatabaseId, generation: u32) -> Result<Vec<u8>, StorageError> {
        self.assert_database_exists(id)?;
        let row: Option<(String, Vec<u8>)> = self
            .conn
            .query_row(
                "SELECT checksum, blob FROM snapshots
                 WHERE database_id = ?1 AND generation = ?2",
                params![id.0, generation],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (recorded, blob) = row.ok_or(StorageError::GenerationNotFound {
            database: id.0,
            generation,
        })?;
        verify_blob(id, generation, &recorded, &blob)?;
        Ok(blob)
    }

    fn generations(&self, id: DatabaseId) -> Result<Vec<GenerationInfo>, StorageError> {
        self.assert_database_exists(id)?;
        let mut stmt = self.conn.prepare_cached(
            "SELECT generation, checksum, length(blob) FROM snapshots
             WHERE database_id = ?1 ORDER BY generation",
        )?;
        let rows = stmt.query_map(params![id.0], |row| {
            let generation: u32 = row.get(0)?;
            let checksum: String = row.get(1)?;
            let bytes: i64 = row.get(2)?;
            Ok(GenerationInfo {
                generation,
                checksum,
                bytes: bytes as usize,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}
