//! Silent token acquisition against a real redb store.
//!
//! Covers the write-back discipline (reads cost no writes, rotations cost
//! one), failure propagation, and same-user refresh serialization.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use driverobot_auth::*;
use driverobot_state::{
    EntityKey, EntityPredicate, KeyedStore, StoreError, StoreHandles, StoreResult, StoredEntity,
};

const GRAPH: &str = "https://graph.microsoft.com";

/// Wraps a real store, counting upserts and optionally failing them.
struct CountingStore {
    inner: Arc<dyn KeyedStore>,
    upserts: AtomicUsize,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl CountingStore {
    fn new(inner: Arc<dyn KeyedStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            upserts: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        })
    }

    fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyedStore for CountingStore {
    async fn get(&self, key: &EntityKey) -> StoreResult<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        self.inner.get(key).await
    }

    async fn upsert(&self, key: &EntityKey, value: Vec<u8>) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(key, value).await
    }

    async fn delete(&self, key: &EntityKey) -> StoreResult<bool> {
        self.inner.delete(key).await
    }

    async fn query_first(
        &self,
        partition: &str,
        predicate: EntityPredicate<'_>,
    ) -> StoreResult<Option<StoredEntity>> {
        self.inner.query_first(partition, predicate).await
    }

    async fn scan(&self, partition: &str) -> StoreResult<Vec<StoredEntity>> {
        self.inner.scan(partition).await
    }
}

/// Issues `access-N` tokens valid for an hour, or fails as configured.
#[derive(Default)]
struct FakeEndpoint {
    calls: AtomicUsize,
    reject: AtomicBool,
    unreachable: AtomicBool,
}

#[async_trait]
impl TokenEndpoint for FakeEndpoint {
    async fn redeem_refresh_token(
        &self,
        _resource: &str,
        _refresh_token: &str,
    ) -> Result<TokenResponse, TokenEndpointError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        // Give a concurrent caller the chance to race.
        tokio::time::sleep(Duration::from_millis(10)).await;
        if self.reject.load(Ordering::SeqCst) {
            return Err(TokenEndpointError::InvalidGrant("AADSTS70008".into()));
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(TokenEndpointError::Transport("connection reset".into()));
        }
        Ok(TokenResponse {
            access_token: format!("access-{n}"),
            refresh_token: Some(format!("refresh-{n}")),
            expires_on: Utc::now() + chrono::Duration::hours(1),
        })
    }
}

struct Harness {
    store: Arc<CountingStore>,
    endpoint: Arc<FakeEndpoint>,
    provider: Arc<SilentTokenProvider>,
}

fn harness() -> Harness {
    let handles = StoreHandles::open_in_memory().unwrap();
    let store = CountingStore::new(handles.token_cache);
    let endpoint = Arc::new(FakeEndpoint::default());
    let provider = Arc::new(SilentTokenProvider::new(endpoint.clone(), store.clone()));
    Harness {
        store,
        endpoint,
        provider,
    }
}

fn sign_in(expires_in: chrono::Duration) -> TokenResponse {
    TokenResponse {
        access_token: "initial".to_string(),
        refresh_token: Some("refresh-0".to_string()),
        expires_on: Utc::now() + expires_in,
    }
}

#[tokio::test]
async fn unknown_user_gets_none_without_writes() {
    let h = harness();
    let token = h.provider.acquire_token_silent(GRAPH, "nobody").await.unwrap();
    assert!(token.is_none());
    assert_eq!(h.store.upserts(), 0);
}

#[tokio::test]
async fn empty_user_id_gets_none() {
    let h = harness();
    assert!(h.provider.acquire_token_silent(GRAPH, "").await.unwrap().is_none());
}

#[tokio::test]
async fn fresh_token_read_triggers_zero_writes() {
    let h = harness();
    h.provider
        .record_sign_in("u1", GRAPH, sign_in(chrono::Duration::hours(1)))
        .await
        .unwrap();
    assert_eq!(h.store.upserts(), 1);

    for _ in 0..3 {
        let token = h.provider.acquire_token_silent(GRAPH, "u1").await.unwrap().unwrap();
        assert_eq!(token.token, "initial");
    }
    assert_eq!(h.store.upserts(), 1);
    assert_eq!(h.endpoint.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rotation_triggers_exactly_one_write() {
    let h = harness();
    h.provider
        .record_sign_in("u1", GRAPH, sign_in(chrono::Duration::minutes(1)))
        .await
        .unwrap();
    let before = h.store.upserts();

    let token = h.provider.acquire_token_silent(GRAPH, "u1").await.unwrap().unwrap();
    assert_eq!(token.token, "access-1");
    assert_eq!(h.store.upserts(), before + 1);

    // The rotated token is now fresh: no further writes.
    let again = h.provider.acquire_token_silent(GRAPH, "u1").await.unwrap().unwrap();
    assert_eq!(again.token, "access-1");
    assert_eq!(h.store.upserts(), before + 1);
}

#[tokio::test]
async fn rejected_refresh_yields_none() {
    let h = harness();
    h.provider
        .record_sign_in("u1", GRAPH, sign_in(chrono::Duration::seconds(-10)))
        .await
        .unwrap();
    h.endpoint.reject.store(true, Ordering::SeqCst);

    assert!(h.provider.acquire_token_silent(GRAPH, "u1").await.unwrap().is_none());
}

#[tokio::test]
async fn unreachable_issuer_is_an_error() {
    let h = harness();
    h.provider
        .record_sign_in("u1", GRAPH, sign_in(chrono::Duration::seconds(-10)))
        .await
        .unwrap();
    h.endpoint.unreachable.store(true, Ordering::SeqCst);

    let err = h.provider.acquire_token_silent(GRAPH, "u1").await.unwrap_err();
    assert!(matches!(err, AuthError::TokenEndpoint(TokenEndpointError::Transport(_))));
}

#[tokio::test]
async fn store_write_failure_propagates() {
    let h = harness();
    h.provider
        .record_sign_in("u1", GRAPH, sign_in(chrono::Duration::seconds(-10)))
        .await
        .unwrap();
    h.store.fail_writes.store(true, Ordering::SeqCst);

    let err = h.provider.acquire_token_silent(GRAPH, "u1").await.unwrap_err();
    assert!(matches!(err, AuthError::Store(StoreError::Unavailable(_))));
}

#[tokio::test]
async fn store_read_failure_is_a_cold_start() {
    let h = harness();
    h.provider
        .record_sign_in("u1", GRAPH, sign_in(chrono::Duration::hours(1)))
        .await
        .unwrap();
    h.store.fail_reads.store(true, Ordering::SeqCst);

    assert!(h.provider.acquire_token_silent(GRAPH, "u1").await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_refreshes_for_one_user_redeem_once() {
    let h = harness();
    h.provider
        .record_sign_in("u1", GRAPH, sign_in(chrono::Duration::seconds(-10)))
        .await
        .unwrap();

    let a = tokio::spawn({
        let provider = h.provider.clone();
        async move { provider.acquire_token_silent(GRAPH, "u1").await }
    });
    let b = tokio::spawn({
        let provider = h.provider.clone();
        async move { provider.acquire_token_silent(GRAPH, "u1").await }
    });

    let ta = a.await.unwrap().unwrap().unwrap();
    let tb = b.await.unwrap().unwrap().unwrap();
    assert_eq!(ta, tb);
    assert_eq!(h.endpoint.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refresh_without_rotated_refresh_token_keeps_previous() {
    struct NoRotation;

    #[async_trait]
    impl TokenEndpoint for NoRotation {
        async fn redeem_refresh_token(
            &self,
            _resource: &str,
            refresh_token: &str,
        ) -> Result<TokenResponse, TokenEndpointError> {
            assert_eq!(refresh_token, "refresh-0");
            Ok(TokenResponse {
                access_token: "renewed".to_string(),
                refresh_token: None,
                expires_on: Utc::now() - chrono::Duration::seconds(1),
            })
        }
    }

    let handles = StoreHandles::open_in_memory().unwrap();
    let provider = SilentTokenProvider::new(Arc::new(NoRotation), handles.token_cache.clone());
    provider
        .record_sign_in("u1", GRAPH, sign_in(chrono::Duration::seconds(-10)))
        .await
        .unwrap();

    provider.acquire_token_silent(GRAPH, "u1").await.unwrap().unwrap();
    let cache = PersistentTokenCache::load("u1", handles.token_cache).await;
    let cached = cache.cache().lookup(GRAPH).unwrap();
    assert_eq!(cached.access_token, "renewed");
    assert_eq!(cached.refresh_token.as_deref(), Some("refresh-0"));
}

#[tokio::test]
async fn token_set_survives_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("robot.redb");

    let original: Vec<CachedToken> = {
        let handles = StoreHandles::open(&path).unwrap();
        let mut cache = PersistentTokenCache::load("u1", handles.token_cache).await;
        for resource in [GRAPH, "https://contoso.sharepoint.com"] {
            cache.cache_mut().insert(CachedToken {
                resource: resource.to_string(),
                access_token: format!("at-{resource}"),
                refresh_token: Some("rt".to_string()),
                expires_on: Utc::now() + chrono::Duration::hours(1),
            });
        }
        cache.after_access().await.unwrap();
        cache.cache().tokens().cloned().collect()
    };

    let handles = StoreHandles::open(&path).unwrap();
    let restored = PersistentTokenCache::load("u1", handles.token_cache).await;
    let tokens: Vec<CachedToken> = restored.cache().tokens().cloned().collect();
    assert_eq!(tokens, original);
}
