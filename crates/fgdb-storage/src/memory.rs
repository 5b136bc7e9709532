//! In-memory implementation of [`SnapshotStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests and anywhere
//! persistence isn't needed. It keeps every generation in HashMaps with the
//! same semantics as the SQLite backend.

use std::collections::HashMap;

use crate::error::StorageError;
use crate::traits::{verify_blob, SnapshotStore};
use crate::types::{DatabaseId, DatabaseSummary, GenerationInfo};

#[derive(Debug, Clone)]
struct StoredDatabase {
    name: String,
    /// Generation `n` lives at index `n - 1`.
    generations: Vec<(GenerationInfo, Vec<u8>)>,
}

/// In-memory implementation of [`SnapshotStore`].
#[derive(Debug)]
pub struct InMemoryStore {
    databases: HashMap<DatabaseId, StoredDatabase>,
    next_database_id: i64,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        InMemoryStore {
            databases: HashMap::new(),
            next_database_id: 1,
        }
    }

    fn get_stored(&self, id: DatabaseId) -> Result<&StoredDatabase, StorageError> {
        self.databases
            .get(&id)
            .ok_or(StorageError::DatabaseNotFound(id.0))
    }

    fn get_stored_mut(&mut self, id: DatabaseId) -> Result<&mut StoredDatabase, StorageError> {
        self.databases
            .get_mut(&id)
            .ok_or(StorageError::DatabaseNotFound(id.0))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore for InMemoryStore {
    fn create_database(&mut self, name: &str) -> Result<DatabaseId, StorageError> {
        if self.find_database(name)?.is_some() {
            return Err(StorageError::DuplicateName(name.to_string()));
        }
        let id = DatabaseId(self.next_database_id);
        self.next_database_id += 1;
        self.databases.insert(
            id,
            StoredDatabase {
                name: name.to_string(),
                generations: Vec::new(),
            },
        );
        Ok(id)
    }

    fn find_database(&self, name: &str) -> Result<Option<DatabaseId>, StorageError> {
        Ok(self
            .databases
            .iter()
            .find(|(_, stored)| stored.name == name)
            .map(|(&id, _)| id))
    }

    fn list_databases(&self) -> Result<Vec<DatabaseSummary>, StorageError> {
        let mut summaries: Vec<DatabaseSummary> = self
            .databases
            .iter()
            .map(|(&id, stored)| DatabaseSummary {
                id,
                name: stored.name.clone(),
                generations: stored.generations.len() as u32,
            })
            .collect();
        summaries.sort_by_key(|s| s.id);
        Ok(summaries)
    }

    fn delete_database(&mut self, id: DatabaseId) -> Result<(), StorageError> {
        self.databases
            .remove(&id)
            .ok_or(StorageError::DatabaseNotFound(id.0))?;
        Ok(())
    }

    fn save_blob(&mut self, id: DatabaseId, blob: &[u8]) -> Result<GenerationInfo, StorageError> {
        let stored = self.get_stored_mut(id)?;
        let info = GenerationInfo::for_blob(stored.generations.len() as u32 + 1, blob);
        stored.generations.push((info.clone(), blob.to_vec()));
        Ok(info)
    }

    fn blob_at(&self, id: DatabaseId, generation: u32) -> Result<Vec<u8>, StorageError> {
        let stored = self.get_stored(id)?;
        let (info, blob) = generation
            .checked_sub(1)
            .and_then(|index| stored.generations.get(index as usize))
            .ok_or(StorageError::GenerationNotFound {
                database: id.0,
                generation,
            })?;
        verify_blob(id, generation, &info.checksum, blob)?;
        Ok(blob.clone())
    }

    fn generations(&self, id: DatabaseId) -> Result<Vec<GenerationInfo>, StorageError> {
        Ok(self
            .get_stored(id)?
            .generations
            .iter()
            .map(|(info, _)| info.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fgdb_core::{FunctionalGraph, ParseErrorPolicy, SequenceClock, StoreConfig};

    fn sample_store() -> FunctionalGraph {
        let lines = ["y1 = f1(x1)", "y2 = f2(y1, x2)"];
        let mut store = FunctionalGraph::new();
        store.configure(lines).unwrap();
        store.execute(lines, &mut SequenceClock::default()).unwrap();
        store
    }

    #[test]
    fn create_list_delete() {
        let mut backend = InMemoryStore::new();
        let a = backend.create_database("alpha").unwrap();
        let b = backend.create_database("beta").unwrap();
        assert_ne!(a, b);

        let names: Vec<_> = backend
            .list_databases()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);

        backend.delete_database(a).unwrap();
        assert_eq!(backend.find_database("alpha").unwrap(), None);
        assert_eq!(backend.find_database("beta").unwrap(), Some(b));
        assert!(matches!(
            backend.delete_database(a),
            Err(StorageError::DatabaseNotFound(_))
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut backend = InMemoryStore::new();
        backend.create_database("alpha").unwrap();
        assert!(matches!(
            backend.create_database("alpha"),
            Err(StorageError::DuplicateName(name)) if name == "alpha"
        ));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let mut backend = InMemoryStore::new();
        let id = backend.create_database("main").unwrap();
        let store = sample_store();

        let info = backend.save(id, &store).unwrap();
        assert_eq!(info.generation, 1);
        assert_eq!(backend.load(id).unwrap(), store);
    }

    #[test]
    fn never_saved_database_loads_empty() {
        let mut backend = InMemoryStore::new();
        let id = backend.create_database("fresh").unwrap();
        assert_eq!(backend.load(id).unwrap(), FunctionalGraph::new());
    }

    #[test]
    fn older_generations_stay_loadable() {
        let mut backend = InMemoryStore::new();
        let id = backend.create_database("main").unwrap();

        let mut store = FunctionalGraph::new();
        store.configure(["y = f(x)"]).unwrap();
        backend.save(id, &store).unwrap();
        let first = store.clone();

        store
            .execute(["y = f(x)"], &mut SequenceClock::default())
            .unwrap();
        backend.save(id, &store).unwrap();

        let gens = backend.generations(id).unwrap();
        assert_eq!(gens.iter().map(|g| g.generation).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(backend.load_generation(id, 1).unwrap(), first);
        assert_eq!(backend.load(id).unwrap(), store);
        assert!(matches!(
            backend.blob_at(id, 3),
            Err(StorageError::GenerationNotFound { generation: 3, .. })
        ));
    }

    #[test]
    fn generation_loads_carry_the_given_config() {
        let mut backend = InMemoryStore::new();
        let id = backend.create_database("main").unwrap();
        backend.save(id, &sample_store()).unwrap();

        let config = StoreConfig {
            parse_errors: ParseErrorPolicy::Skip,
            anchor_independents: false,
        };
        let older = backend
            .load_generation_with_config(id, 1, config.clone())
            .unwrap();
        assert_eq!(older.config(), &config);
        assert_eq!(older, sample_store());
        assert_eq!(backend.load_generation(id, 1).unwrap().config(), &StoreConfig::default());
    }

    #[test]
    fn corrupted_blob_fails_integrity_check() {
        let mut backend = InMemoryStore::new();
        let id = backend.create_database("main").unwrap();
        backend.save(id, &sample_store()).unwrap();

        let stored = backend.databases.get_mut(&id).unwrap();
        stored.generations[0].1.push(b' ');
        assert!(matches!(
            backend.load(id),
            Err(StorageError::IntegrityError { .. })
        ));
    }

    #[test]
    fn operations_on_missing_database_fail() {
        let mut backend = InMemoryStore::new();
        let missing = DatabaseId(42);
        assert!(matches!(backend.load(missing), Err(StorageError::DatabaseNotFound(42))));
        assert!(matches!(
            backend.save(missing, &FunctionalGraph::new()),
            Err(StorageError::DatabaseNotFound(42))
        ));
    }
}
