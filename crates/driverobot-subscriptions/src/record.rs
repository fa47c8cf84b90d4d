//! Persisted subscription state.
//!
//! One [`SubscriptionRecord`] pairs a live webhook subscription with the
//! owning user and the delta cursor to resume from. Records live in the sync
//! state table under partition `subscription`, row = subscription id, and are
//! found by user through a partition scan.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use driverobot_core::{SubscriptionId, UserId};
use driverobot_state::{KeyedStore, RecordTable, StoreResult, TableRecord};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const SUBSCRIPTION_PARTITION: &str = "subscription";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub subscription_id: SubscriptionId,
    pub user_id: UserId,
    /// Opaque resumption point in the watched resource's change feed.
    pub delta_cursor: String,
    /// Expiration the provider reported at the last create or renewal.
    pub expiration: Option<DateTime<Utc>>,
}

impl TableRecord for SubscriptionRecord {
    const PARTITION: &'static str = SUBSCRIPTION_PARTITION;

    fn row_key(&self) -> &str {
        &self.subscription_id
    }
}

/// CRUD over subscription records. No business rules live here; callers
/// keep the one-record-per-user invariant.
#[derive(Clone)]
pub struct SubscriptionRecordStore {
    table: RecordTable<SubscriptionRecord>,
}

impl SubscriptionRecordStore {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self {
            table: RecordTable::new(store),
        }
    }

    /// Insert or replace the record with the same subscription id.
    pub async fn upsert(&self, record: &SubscriptionRecord) -> StoreResult<()> {
        self.table.upsert(record).await
    }

    /// Point lookup. A failed read is reported as absence.
    pub async fn find_by_subscription_id(&self, id: &str) -> Option<SubscriptionRecord> {
        match self.table.get(id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(subscription_id = %id, error = %e, "subscription lookup failed");
                None
            }
        }
    }

    /// First record owned by `user_id`. A failed scan is reported as absence.
    pub async fn find_by_user_id(&self, user_id: &str) -> Option<SubscriptionRecord> {
        match self.table.find_first(|r| r.user_id == user_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(%user_id, error = %e, "subscription lookup by user failed");
                None
            }
        }
    }

    /// Every record owned by `user_id`. A failed scan is reported as none.
    pub async fn find_all_by_user_id(&self, user_id: &str) -> Vec<SubscriptionRecord> {
        match self.table.list().await {
            Ok(records) => records.into_iter().filter(|r| r.user_id == user_id).collect(),
            Err(e) => {
                warn!(%user_id, error = %e, "subscription scan by user failed");
                Vec::new()
            }
        }
    }

    /// Remove `record`. Deleting an absent record succeeds with `false`.
    pub async fn delete(&self, record: &SubscriptionRecord) -> StoreResult<bool> {
        self.table.delete(record).await
    }

    pub async fn list(&self) -> StoreResult<Vec<SubscriptionRecord>> {
        self.table.list().await
    }
}
