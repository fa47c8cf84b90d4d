//! In-memory token cache with change tracking.
//!
//! `TokenCache` is the identity layer's working state for one user: the
//! tokens it holds, keyed by resource. Every mutation raises the
//! `has_state_changed` flag; reads never do. The flag is what
//! [`PersistentTokenCache`](crate::PersistentTokenCache) consults before
//! writing anything back to the store.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Version tag written into serialized cache bytes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// A token issued for one resource.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    pub resource: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_on: DateTime<Utc>,
}

impl CachedToken {
    /// True when the access token is expired or expires within `skew` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, skew: chrono::Duration) -> bool {
        self.expires_on <= now + skew
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("resource", &self.resource)
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct CacheSnapshot {
    version: u32,
    tokens: Vec<CachedToken>,
}

#[derive(Debug, Default)]
pub struct TokenCache {
    entries: BTreeMap<String, CachedToken>,
    state_changed: bool,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, resource: &str) -> Option<&CachedToken> {
        self.entries.get(resource)
    }

    /// Store `token` under its resource. Re-inserting an identical token is a no-op.
    pub fn insert(&mut self, token: CachedToken) {
        if self.entries.get(&token.resource) == Some(&token) {
            return;
        }
        self.entries.insert(token.resource.clone(), token);
        self.state_changed = true;
    }

    pub fn remove(&mut self, resource: &str) -> Option<CachedToken> {
        let removed = self.entries.remove(resource);
        if removed.is_some() {
            self.state_changed = true;
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.state_changed = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &CachedToken> {
        self.entries.values()
    }

    pub fn has_state_changed(&self) -> bool {
        self.state_changed
    }

    /// Clear the change flag once the current state has been persisted.
    pub fn mark_persisted(&mut self) {
        self.state_changed = false;
    }

    /// Serialize the full cache state.
    pub fn serialize(&self) -> AuthResult<Vec<u8>> {
        let snapshot = CacheSnapshot {
            version: CACHE_FORMAT_VERSION,
            tokens: self.entries.values().cloned().collect(),
        };
        serde_json::to_vec(&snapshot).map_err(|e| AuthError::CacheFormat(e.to_string()))
    }

    /// Replace the cache state with previously serialized bytes. The change
    /// flag is left clear: the state now matches what was persisted.
    pub fn deserialize(&mut self, bytes: &[u8]) -> AuthResult<()> {
        let snapshot: CacheSnapshot =
            serde_json::from_slice(bytes).map_err(|e| AuthError::CacheFormat(e.to_string()))?;
        if snapshot.version != CACHE_FORMAT_VERSION {
            return Err(AuthError::CacheFormat(format!(
                "unsupported cache version {}",
                snapshot.version
            )));
        }
        self.entries = snapshot
            .tokens
            .into_iter()
            .map(|token| (token.resource.clone(), token))
            .collect();
        self.state_changed = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(resource: &str, access: &str) -> CachedToken {
        CachedToken {
            resource: resource.to_string(),
            access_token: access.to_string(),
            refresh_token: Some(format!("refresh-{access}")),
            expires_on: DateTime::from_timestamp(1_900_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn reads_do_not_mark_changed() {
        let mut cache = TokenCache::new();
        cache.insert(token("graph", "a"));
        cache.mark_persisted();

        assert!(cache.lookup("graph").is_some());
        assert!(cache.lookup("other").is_none());
        assert_eq!(cache.resources().count(), 1);
        assert!(!cache.has_state_changed());
    }

    #[test]
    fn mutations_mark_changed() {
        let mut cache = TokenCache::new();
        cache.insert(token("graph", "a"));
        assert!(cache.has_state_changed());

        cache.mark_persisted();
        cache.insert(token("graph", "b"));
        assert!(cache.has_state_changed());

        cache.mark_persisted();
        assert!(cache.remove("graph").is_some());
        assert!(cache.has_state_changed());
    }

    #[test]
    fn identical_insert_and_noop_removal_stay_clean() {
        let mut cache = TokenCache::new();
        cache.insert(token("graph", "a"));
        cache.mark_persisted();

        cache.insert(token("graph", "a"));
        assert!(cache.remove("missing").is_none());
        assert!(!cache.has_state_changed());

        cache.mark_persisted();
        let mut empty = TokenCache::new();
        empty.clear();
        assert!(!empty.has_state_changed());
    }

    #[test]
    fn serialize_then_deserialize_preserves_tokens() {
        let mut cache = TokenCache::new();
        cache.insert(token("graph", "a"));
        cache.insert(token("sharepoint", "b"));
        let bits = cache.serialize().unwrap();

        let mut restored = TokenCache::new();
        restored.deserialize(&bits).unwrap();

        assert!(!restored.has_state_changed());
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.lookup("graph"), cache.lookup("graph"));
        assert_eq!(restored.lookup("sharepoint"), cache.lookup("sharepoint"));
    }

    #[test]
    fn deserialize_rejects_garbage_and_unknown_versions() {
        let mut cache = TokenCache::new();
        assert!(cache.deserialize(b"not a cache").is_err());
        assert!(
            cache
                .deserialize(br#"{"version":99,"tokens":[]}"#)
                .is_err()
        );
    }

    #[test]
    fn expiry_window() {
        let t = token("graph", "a");
        let before = t.expires_on - chrono::Duration::minutes(10);
        assert!(!t.expires_within(before, chrono::Duration::minutes(5)));
        assert!(t.expires_within(before, chrono::Duration::minutes(10)));
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", token("graph", "super-secret"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("graph"));
    }
}
