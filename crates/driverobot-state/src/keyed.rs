//! The keyed store contract.
//!
//! A `KeyedStore` is one logical table of opaque byte values addressed by an
//! [`EntityKey`]. Implementations provide atomic single-row upsert and delete;
//! nothing here spans rows.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{EntityKey, StoredEntity};

/// Filter applied to rows during a partition scan.
pub type EntityPredicate<'a> = &'a (dyn Fn(&StoredEntity) -> bool + Send + Sync);

#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Point lookup. `Ok(None)` when the row does not exist.
    async fn get(&self, key: &EntityKey) -> StoreResult<Option<Vec<u8>>>;

    /// Insert or replace the row at `key`.
    async fn upsert(&self, key: &EntityKey, value: Vec<u8>) -> StoreResult<()>;

    /// Remove the row at `key`. Returns whether it existed.
    async fn delete(&self, key: &EntityKey) -> StoreResult<bool>;

    /// First row in `partition` (in row-key order) matching `predicate`.
    async fn query_first(
        &self,
        partition: &str,
        predicate: EntityPredicate<'_>,
    ) -> StoreResult<Option<StoredEntity>>;

    /// Every row in `partition`, in row-key order.
    async fn scan(&self, partition: &str) -> StoreResult<Vec<StoredEntity>>;
}
