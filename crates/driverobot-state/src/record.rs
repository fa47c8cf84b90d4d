//! Typed records on top of a [`KeyedStore`].
//!
//! Domain records stay plain serde structs. A record declares its partition
//! and row key through [`TableRecord`]; [`RecordTable`] does the key mapping
//! and JSON encoding.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::keyed::KeyedStore;
use crate::types::{EntityKey, StoredEntity};

/// A record that knows where it lives in a keyed store.
pub trait TableRecord: Serialize + DeserializeOwned + Send + Sync {
    /// Partition every record of this type is stored under.
    const PARTITION: &'static str;

    fn row_key(&self) -> &str;

    fn entity_key(&self) -> EntityKey {
        EntityKey::new(Self::PARTITION, self.row_key())
    }
}

/// Typed view of a keyed store holding records of type `T`.
pub struct RecordTable<T> {
    store: Arc<dyn KeyedStore>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for RecordTable<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _record: PhantomData,
        }
    }
}

fn decode<T: TableRecord>(entity: &StoredEntity) -> StoreResult<T> {
    serde_json::from_slice(&entity.value)
        .map_err(|e| StoreError::Deserialize(format!("{}: {e}", entity.key)))
}

impl<T: TableRecord> RecordTable<T> {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    pub async fn get(&self, row: &str) -> StoreResult<Option<T>> {
        let key = EntityKey::new(T::PARTITION, row);
        match self.store.get(&key).await? {
            Some(bytes) => {
                let record = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Deserialize(format!("{key}: {e}")))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    pub async fn upsert(&self, record: &T) -> StoreResult<()> {
        let value = serde_json::to_vec(record).map_err(|e| StoreError::Serialize(e.to_string()))?;
        self.store.upsert(&record.entity_key(), value).await
    }

    /// Remove `record`'s row. Returns whether it existed.
    pub async fn delete(&self, record: &T) -> StoreResult<bool> {
        self.store.delete(&record.entity_key()).await
    }

    /// First record in the partition matching `predicate`. Rows that fail to
    /// decode are skipped.
    pub async fn find_first<F>(&self, predicate: F) -> StoreResult<Option<T>>
    where
        F: Fn(&T) -> bool + Send + Sync,
    {
        let matcher = |entity: &StoredEntity| match decode::<T>(entity) {
            Ok(record) => predicate(&record),
            Err(e) => {
                warn!(error = %e, "skipping undecodable row");
                false
            }
        };
        match self.store.query_first(T::PARTITION, &matcher).await? {
            Some(entity) => Ok(Some(decode(&entity)?)),
            None => Ok(None),
        }
    }

    /// All decodable records in the partition.
    pub async fn list(&self) -> StoreResult<Vec<T>> {
        let rows = self.store.scan(T::PARTITION).await?;
        let mut records = Vec::with_capacity(rows.len());
        for entity in &rows {
            match decode(entity) {
                Ok(record) => records.push(record),
                Err(e) => warn!(error = %e, "skipping undecodable row"),
            }
        }
        Ok(records)
    }
}
