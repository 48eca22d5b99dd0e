//! StateStore — redb-backed state persistence for capscale.
//!
//! Provides typed operations over last-attempt records and the local
//! collection registry. All values are JSON-serialized into redb's `&[u8]`
//! value columns. The store supports both on-disk and in-memory backends
//! (the latter for testing).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
///
/// The two-argument form tags the error with the table it came from.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
    ($variant:ident, $table:expr) => {
        |e| StateError::$variant {
            table: $table,
            reason: e.to_string(),
        }
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(|e| StateError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(|e| StateError::Open {
                path: "<memory>".to_string(),
                reason: e.to_string(),
            })?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(LAST_ATTEMPTS).map_err(map_err!(Table, LAST_ATTEMPTS_TABLE))?;
        txn.open_table(COLLECTIONS).map_err(map_err!(Table, COLLECTIONS_TABLE))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Last attempts ──────────────────────────────────────────────

    /// Timestamp (ms) of the last attempt for `key`, or `None` if the key
    /// was never recorded or its record has expired.
    pub fn get_last_attempt(&self, key: &str, now_ms: u64) -> StateResult<Option<u64>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(LAST_ATTEMPTS).map_err(map_err!(Table, LAST_ATTEMPTS_TABLE))?;
        match table.get(key).map_err(map_err!(Read, LAST_ATTEMPTS_TABLE))? {
            Some(guard) => {
                let record: AttemptRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Corrupt, LAST_ATTEMPTS_TABLE))?;
                if record.is_expired(now_ms) {
                    Ok(None)
                } else {
                    Ok(Some(record.attempted_at_ms))
                }
            }
            None => Ok(None),
        }
    }

    /// Record an attempt for `key` that stays visible for `ttl`.
    pub fn set_last_attempt(&self, key: &str, attempted_at_ms: u64, ttl: Duration) -> StateResult<()> {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let record = AttemptRecord {
            attempted_at_ms,
            expires_at_ms: attempted_at_ms.saturating_add(ttl_ms),
        };
        let value = serde_json::to_vec(&record).map_err(map_err!(Encode, LAST_ATTEMPTS_TABLE))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(LAST_ATTEMPTS).map_err(map_err!(Table, LAST_ATTEMPTS_TABLE))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write, LAST_ATTEMPTS_TABLE))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, attempted_at_ms, ttl_ms, "last attempt recorded");
        Ok(())
    }

    /// Remove expired last-attempt records. Returns number removed.
    pub fn purge_expired_attempts(&self, now_ms: u64) -> StateResult<u32> {
        let expired: Vec<String> = {
            let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(LAST_ATTEMPTS).map_err(map_err!(Table, LAST_ATTEMPTS_TABLE))?;
            let mut keys = Vec::new();
            for entry in table.iter().map_err(map_err!(Read, LAST_ATTEMPTS_TABLE))? {
                let (key, value) = entry.map_err(map_err!(Read, LAST_ATTEMPTS_TABLE))?;
                let record: AttemptRecord =
                    serde_json::from_slice(value.value()).map_err(map_err!(Corrupt, LAST_ATTEMPTS_TABLE))?;
                if record.is_expired(now_ms) {
                    keys.push(key.value().to_string());
                }
            }
            keys
        };

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count = expired.len() as u32;
        {
            let mut table = txn.open_table(LAST_ATTEMPTS).map_err(map_err!(Table, LAST_ATTEMPTS_TABLE))?;
            for key in &expired {
                table.remove(key.as_str()).map_err(map_err!(Write, LAST_ATTEMPTS_TABLE))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        if count > 0 {
            debug!(count, "expired attempt records purged");
        }
        Ok(count)
    }

    // ── Collections ────────────────────────────────────────────────

    /// Insert or update a collection record.
    pub fn put_collection(&self, record: &CollectionRecord) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Encode, COLLECTIONS_TABLE))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(COLLECTIONS).map_err(map_err!(Table, COLLECTIONS_TABLE))?;
            table
                .insert(record.id.as_str(), value.as_slice())
                .map_err(map_err!(Write, COLLECTIONS_TABLE))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(collection = %record.id, capacity = record.capacity, "collection stored");
        Ok(())
    }

    /// Insert a collection record unless one with the same id exists.
    /// Returns true if the record was inserted.
    pub fn insert_collection_if_absent(&self, record: &CollectionRecord) -> StateResult<bool> {
        let value = serde_json::to_vec(record).map_err(map_err!(Encode, COLLECTIONS_TABLE))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let inserted;
        {
            let mut table = txn.open_table(COLLECTIONS).map_err(map_err!(Table, COLLECTIONS_TABLE))?;
            let exists = table
                .get(record.id.as_str())
                .map_err(map_err!(Read, COLLECTIONS_TABLE))?
                .is_some();
            if !exists {
                table
                    .insert(record.id.as_str(), value.as_slice())
                    .map_err(map_err!(Write, COLLECTIONS_TABLE))?;
            }
            inserted = !exists;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(inserted)
    }

    /// Get a collection by id.
    pub fn get_collection(&self, id: &str) -> StateResult<Option<CollectionRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(COLLECTIONS).map_err(map_err!(Table, COLLECTIONS_TABLE))?;
        match table.get(id).map_err(map_err!(Read, COLLECTIONS_TABLE))? {
            Some(guard) => {
                let record: CollectionRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Corrupt, COLLECTIONS_TABLE))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all collections.
    pub fn list_collections(&self) -> StateResult<Vec<CollectionRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(COLLECTIONS).map_err(map_err!(Table, COLLECTIONS_TABLE))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read, COLLECTIONS_TABLE))? {
            let (_, value) = entry.map_err(map_err!(Read, COLLECTIONS_TABLE))?;
            let record: CollectionRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Corrupt, COLLECTIONS_TABLE))?;
            results.push(record);
        }
        Ok(results)
    }

    /// Set the capacity of an existing collection in one write transaction.
    ///
    /// Returns the updated record, or `None` if the collection is unknown.
    pub fn update_capacity(
        &self,
        id: &str,
        capacity: u64,
        now_ms: u64,
    ) -> StateResult<Option<CollectionRecord>> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let updated;
        {
            let mut table = txn.open_table(COLLECTIONS).map_err(map_err!(Table, COLLECTIONS_TABLE))?;
            let current: Option<CollectionRecord> = match table.get(id).map_err(map_err!(Read, COLLECTIONS_TABLE))? {
                Some(guard) => Some(
                    serde_json::from_slice(guard.value()).map_err(map_err!(Corrupt, COLLECTIONS_TABLE))?,
                ),
                None => None,
            };
            updated = match current {
                Some(mut record) => {
                    record.capacity = capacity;
                    record.updated_at_ms = now_ms;
                    let value = serde_json::to_vec(&record).map_err(map_err!(Encode, COLLECTIONS_TABLE))?;
                    table.insert(id, value.as_slice()).map_err(map_err!(Write, COLLECTIONS_TABLE))?;
                    Some(record)
                }
                None => None,
            };
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(collection = %id, capacity, found = updated.is_some(), "capacity updated");
        Ok(updated)
    }

    /// Delete a collection by id. Returns true if it existed.
    pub fn delete_collection(&self, id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(COLLECTIONS).map_err(map_err!(Table, COLLECTIONS_TABLE))?;
            existed = table.remove(id).map_err(map_err!(Write, COLLECTIONS_TABLE))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(collection = %id, existed, "collection deleted");
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_collection(id: &str, capacity: u64) -> CollectionRecord {
        CollectionRecord {
            id: id.to_string(),
            capacity,
            partitions: 10,
            updated_at_ms: 1000,
        }
    }

    // ── Last attempts ──────────────────────────────────────────────

    #[test]
    fn unknown_key_reads_as_never() {
        let store = StateStore::open_in_memory().unwrap();
        assert_eq!(store.get_last_attempt("autoscaler:nope", 0).unwrap(), None);
    }

    #[test]
    fn attempt_visible_until_expiry() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .set_last_attempt("autoscaler:c1", 10_000, Duration::from_secs(60))
            .unwrap();

        assert_eq!(store.get_last_attempt("autoscaler:c1", 10_001).unwrap(), Some(10_000));
        assert_eq!(store.get_last_attempt("autoscaler:c1", 69_999).unwrap(), Some(10_000));
        assert_eq!(store.get_last_attempt("autoscaler:c1", 70_000).unwrap(), None);
    }

    #[test]
    fn attempt_overwrites_previous() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .set_last_attempt("k", 1_000, Duration::from_secs(60))
            .unwrap();
        store
            .set_last_attempt("k", 5_000, Duration::from_secs(60))
            .unwrap();

        assert_eq!(store.get_last_attempt("k", 6_000).unwrap(), Some(5_000));
    }

    #[test]
    fn purge_removes_only_expired() {
        let store = StateStore::open_in_memory().unwrap();
        store.set_last_attempt("old", 0, Duration::from_secs(1)).unwrap();
        store.set_last_attempt("new", 0, Duration::from_secs(600)).unwrap();

        assert_eq!(store.purge_expired_attempts(5_000).unwrap(), 1);
        assert_eq!(store.get_last_attempt("new", 5_000).unwrap(), Some(0));
        assert_eq!(store.purge_expired_attempts(5_000).unwrap(), 0);
    }

    // ── Collections ────────────────────────────────────────────────

    #[test]
    fn collection_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let record = test_collection("commands", 1000);

        store.put_collection(&record).unwrap();
        assert_eq!(store.get_collection("commands").unwrap(), Some(record));
        assert!(store.get_collection("missing").unwrap().is_none());
    }

    #[test]
    fn collection_list_and_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_collection(&test_collection("a", 100)).unwrap();
        store.put_collection(&test_collection("b", 200)).unwrap();

        assert_eq!(store.list_collections().unwrap().len(), 2);
        assert!(store.delete_collection("a").unwrap());
        assert!(!store.delete_collection("a").unwrap());
        assert_eq!(store.list_collections().unwrap().len(), 1);
    }

    #[test]
    fn insert_if_absent_keeps_existing() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.insert_collection_if_absent(&test_collection("c", 1000)).unwrap());
        assert!(!store.insert_collection_if_absent(&test_collection("c", 5000)).unwrap());

        assert_eq!(store.get_collection("c").unwrap().unwrap().capacity, 1000);
    }

    #[test]
    fn update_capacity_existing_and_missing() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_collection(&test_collection("c", 1000)).unwrap();

        let updated = store.update_capacity("c", 2000, 9_000).unwrap().unwrap();
        assert_eq!(updated.capacity, 2000);
        assert_eq!(updated.updated_at_ms, 9_000);
        assert_eq!(store.get_collection("c").unwrap(), Some(updated));

        assert!(store.update_capacity("missing", 2000, 9_000).unwrap().is_none());
    }

    #[test]
    fn record_state_and_ceiling() {
        let record = test_collection("c", 1000);
        assert_eq!(record.state().current_capacity, 1000);
        assert_eq!(record.state().partition_count, 10);
        assert_eq!(record.ceiling(), 100_000);
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("capscale.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.put_collection(&test_collection("c", 1000)).unwrap();
            store
                .set_last_attempt("autoscaler:c", 1_000, Duration::from_secs(300))
                .unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        assert_eq!(store.get_collection("c").unwrap().unwrap().capacity, 1000);
        assert_eq!(store.get_last_attempt("autoscaler:c", 2_000).unwrap(), Some(1_000));
    }
}
