//! Token cache persisted per user in a keyed store.
//!
//! On construction the user's blob is loaded from partition `tokenCache`,
//! row = user id. A missing, unreadable, or corrupt blob is a cold start,
//! never an error. After every cache access the identity layer calls
//! [`PersistentTokenCache::after_access`], which writes the blob back only
//! when the in-memory state actually changed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use driverobot_state::{KeyedStore, RecordTable, TableRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::TokenCache;
use crate::error::AuthResult;

/// Partition holding every user's serialized token cache.
pub const TOKEN_CACHE_PARTITION: &str = "tokenCache";

/// Persisted form of one user's token cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedTokenBlob {
    pub user_id: String,
    #[serde(with = "base64_bytes")]
    pub cache_bits: Vec<u8>,
    pub last_write: DateTime<Utc>,
}

/// Cache bytes are stored as a standard base64 string.
mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(de::Error::custom)
    }
}

impl TableRecord for CachedTokenBlob {
    const PARTITION: &'static str = TOKEN_CACHE_PARTITION;

    fn row_key(&self) -> &str {
        &self.user_id
    }
}

pub struct PersistentTokenCache {
    user_id: String,
    blobs: RecordTable<CachedTokenBlob>,
    cache: TokenCache,
    last_write: Option<DateTime<Utc>>,
}

impl PersistentTokenCache {
    /// Hydrate the cache for `user_id` from `store`.
    pub async fn load(user_id: &str, store: Arc<dyn KeyedStore>) -> Self {
        let blobs: RecordTable<CachedTokenBlob> = RecordTable::new(store);
        let mut cache = TokenCache::new();
        let mut last_write = None;

        match blobs.get(user_id).await {
            Ok(Some(blob)) => match cache.deserialize(&blob.cache_bits) {
                Ok(()) => {
                    last_write = Some(blob.last_write);
                    debug!(%user_id, tokens = cache.len(), "token cache loaded");
                }
                Err(e) => warn!(%user_id, error = %e, "discarding unreadable token cache"),
            },
            Ok(None) => debug!(%user_id, "no persisted token cache"),
            Err(e) => warn!(%user_id, error = %e, "token cache lookup failed, starting empty"),
        }

        Self {
            user_id: user_id.to_string(),
            blobs,
            cache,
            last_write,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut TokenCache {
        &mut self.cache
    }

    /// When the blob this cache reflects was last written.
    pub fn last_write(&self) -> Option<DateTime<Utc>> {
        self.last_write
    }

    /// Write the cache back if it changed since the last persist. Returns
    /// whether a write happened. On failure the change flag stays raised.
    pub async fn after_access(&mut self) -> AuthResult<bool> {
        if !self.cache.has_state_changed() {
            return Ok(false);
        }

        let blob = CachedTokenBlob {
            user_id: self.user_id.clone(),
            cache_bits: self.cache.serialize()?,
            last_write: Utc::now(),
        };
        self.blobs.upsert(&blob).await?;

        self.cache.mark_persisted();
        self.last_write = Some(blob.last_write);
        debug!(user_id = %self.user_id, tokens = self.cache.len(), "token cache persisted");
        Ok(true)
    }
}
