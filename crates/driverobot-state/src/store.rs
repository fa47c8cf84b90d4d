//! redb-backed keyed store.
//!
//! `RedbStore` owns the database; `RedbTable` is a cheap handle onto one of
//! its tables and implements [`KeyedStore`]. `StoreHandles` bundles the two
//! tables the robot uses so they can be opened once at process start and
//! passed down explicitly.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableHandle};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::keyed::{EntityPredicate, KeyedStore};
use crate::tables::*;
use crate::types::{EntityKey, StoredEntity};

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Thread-safe redb database holding every entity table.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        for table in ALL_TABLES {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Handle onto one table of this database.
    pub fn table(&self, table: EntityTable) -> RedbTable {
        RedbTable {
            db: self.db.clone(),
            table,
        }
    }
}

/// One redb table viewed as a [`KeyedStore`].
#[derive(Clone)]
pub struct RedbTable {
    db: Arc<Database>,
    table: EntityTable,
}

impl RedbTable {
    pub fn name(&self) -> &str {
        self.table.name()
    }

    fn get_row(&self, key: &EntityKey) -> StoreResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(self.table).map_err(map_err!(Table))?;
        let row = table
            .get((key.partition.as_str(), key.row.as_str()))
            .map_err(map_err!(Read))?;
        Ok(row.map(|guard| guard.value().to_vec()))
    }

    fn put_row(&self, key: &EntityKey, value: &[u8]) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(self.table).map_err(map_err!(Table))?;
            table
                .insert((key.partition.as_str(), key.row.as_str()), value)
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = self.name(), %key, bytes = value.len(), "row stored");
        Ok(())
    }

    fn remove_row(&self, key: &EntityKey) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(self.table).map_err(map_err!(Table))?;
            existed = table
                .remove((key.partition.as_str(), key.row.as_str()))
                .map_err(map_err!(Write))?
                .is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = self.name(), %key, existed, "row deleted");
        Ok(existed)
    }

    /// Walk `partition` in key order, stopping early when `visit` returns false.
    fn walk_partition(
        &self,
        partition: &str,
        mut visit: impl FnMut(StoredEntity) -> bool,
    ) -> StoreResult<()> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(self.table).map_err(map_err!(Table))?;
        // Keys sort by partition first, so the partition is one contiguous run.
        for entry in table.range((partition, "")..).map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let (p, r) = key.value();
            if p != partition {
                break;
            }
            let entity = StoredEntity {
                key: EntityKey::new(p, r),
                value: value.value().to_vec(),
            };
            if !visit(entity) {
                break;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl KeyedStore for RedbTable {
    async fn get(&self, key: &EntityKey) -> StoreResult<Option<Vec<u8>>> {
        self.get_row(key)
    }

    async fn upsert(&self, key: &EntityKey, value: Vec<u8>) -> StoreResult<()> {
        self.put_row(key, &value)
    }

    async fn delete(&self, key: &EntityKey) -> StoreResult<bool> {
        self.remove_row(key)
    }

    async fn query_first(
        &self,
        partition: &str,
        predicate: EntityPredicate<'_>,
    ) -> StoreResult<Option<StoredEntity>> {
        let mut found = None;
        self.walk_partition(partition, |entity| {
            if predicate(&entity) {
                found = Some(entity);
                false
            } else {
                true
            }
        })?;
        Ok(found)
    }

    async fn scan(&self, partition: &str) -> StoreResult<Vec<StoredEntity>> {
        let mut rows = Vec::new();
        self.walk_partition(partition, |entity| {
            rows.push(entity);
            true
        })?;
        Ok(rows)
    }
}

/// The store handles the robot's components are constructed with.
#[derive(Clone)]
pub struct StoreHandles {
    pub token_cache: Arc<dyn KeyedStore>,
    pub sync_state: Arc<dyn KeyedStore>,
}

impl StoreHandles {
    /// Open the on-disk database at `path` and hand out both tables.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Ok(Self::from_store(&RedbStore::open(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_store(&RedbStore::open_in_memory()?))
    }

    pub fn from_store(store: &RedbStore) -> Self {
        Self {
            token_cache: Arc::new(store.table(TOKEN_CACHE)),
            sync_state: Arc::new(store.table(SYNC_STATE)),
        }
    }
}
