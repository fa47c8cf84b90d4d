//! Silent token acquisition over the persistent token cache.
//!
//! [`IdentityProvider`] is the seam the rest of the robot depends on.
//! [`SilentTokenProvider`] implements it: it hydrates the user's cache, hands
//! back a cached token while it is fresh, and redeems the refresh token with
//! the remote [`TokenEndpoint`] when it is not. Each acquisition runs under
//! the user's lock so two refreshes for one user never interleave their
//! read-modify-write of the cache blob.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use driverobot_core::UserLocks;
use driverobot_core::config::IdentityConfig;
use driverobot_state::KeyedStore;
use tracing::{debug, info, warn};

use crate::cache::CachedToken;
use crate::error::{AuthResult, TokenEndpointError};
use crate::persistent::PersistentTokenCache;

/// Bearer token handed to remote API calls.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

impl From<&CachedToken> for AccessToken {
    fn from(cached: &CachedToken) -> Self {
        Self {
            token: cached.access_token.clone(),
            expires_on: cached.expires_on,
        }
    }
}

/// Tokens returned by the issuer for a redeemed grant.
#[derive(Clone)]
pub struct TokenResponse {
    pub access_token: String,
    /// Issuers may omit a rotated refresh token; the previous one stays valid then.
    pub refresh_token: Option<String>,
    pub expires_on: DateTime<Utc>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Remote token issuer.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn redeem_refresh_token(
        &self,
        resource: &str,
        refresh_token: &str,
    ) -> Result<TokenResponse, TokenEndpointError>;
}

/// Non-interactive token source.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` means there is no usable session for the user and an
    /// interactive sign-in is required. `Err` is reserved for infrastructure
    /// failures (store writes, issuer unreachable).
    async fn acquire_token_silent(
        &self,
        resource: &str,
        user_id: &str,
    ) -> AuthResult<Option<AccessToken>>;
}

pub struct SilentTokenProvider {
    endpoint: Arc<dyn TokenEndpoint>,
    store: Arc<dyn KeyedStore>,
    locks: UserLocks,
    refresh_skew: chrono::Duration,
}

impl SilentTokenProvider {
    pub fn new(endpoint: Arc<dyn TokenEndpoint>, store: Arc<dyn KeyedStore>) -> Self {
        Self {
            endpoint,
            store,
            locks: UserLocks::new(),
            refresh_skew: chrono::Duration::minutes(5),
        }
    }

    pub fn from_config(
        config: &IdentityConfig,
        endpoint: Arc<dyn TokenEndpoint>,
        store: Arc<dyn KeyedStore>,
    ) -> Self {
        let skew = i64::try_from(config.refresh_skew_secs).unwrap_or(i64::MAX);
        Self::new(endpoint, store).with_refresh_skew(chrono::Duration::seconds(skew))
    }

    /// Share a lock registry with other components touching the same users.
    /// Callers must not hold the user's lock from that registry while
    /// acquiring a token; the mutex is not re-entrant.
    pub fn with_locks(mut self, locks: UserLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_refresh_skew(mut self, skew: chrono::Duration) -> Self {
        self.refresh_skew = skew;
        self
    }

    /// Seed the user's cache with tokens obtained from an interactive sign-in.
    pub async fn record_sign_in(
        &self,
        user_id: &str,
        resource: &str,
        response: TokenResponse,
    ) -> AuthResult<()> {
        let _guard = self.locks.lock(user_id).await;
        let mut cache = PersistentTokenCache::load(user_id, self.store.clone()).await;
        cache.cache_mut().insert(CachedToken {
            resource: resource.to_string(),
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_on: response.expires_on,
        });
        cache.after_access().await?;
        info!(%user_id, %resource, "sign-in tokens cached");
        Ok(())
    }

    async fn refresh(
        &self,
        cache: &mut PersistentTokenCache,
        cached: CachedToken,
    ) -> AuthResult<Option<AccessToken>> {
        let user_id = cache.user_id().to_string();
        let Some(refresh_token) = cached.refresh_token.clone() else {
            debug!(%user_id, resource = %cached.resource, "token expired and no refresh token cached");
            return Ok(None);
        };

        match self
            .endpoint
            .redeem_refresh_token(&cached.resource, &refresh_token)
            .await
        {
            Ok(response) => {
                let rotated = CachedToken {
                    resource: cached.resource,
                    access_token: response.access_token,
                    refresh_token: response.refresh_token.or(Some(refresh_token)),
                    expires_on: response.expires_on,
                };
                let token = AccessToken::from(&rotated);
                cache.cache_mut().insert(rotated);
                debug!(%user_id, "access token refreshed");
                Ok(Some(token))
            }
            Err(TokenEndpointError::InvalidGrant(reason)) => {
                warn!(%user_id, %reason, "refresh token rejected, sign-in required");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl IdentityProvider for SilentTokenProvider {
    async fn acquire_token_silent(
        &self,
        resource: &str,
        user_id: &str,
    ) -> AuthResult<Option<AccessToken>> {
        if user_id.is_empty() {
            return Ok(None);
        }

        let _guard = self.locks.lock(user_id).await;
        let mut cache = PersistentTokenCache::load(user_id, self.store.clone()).await;

        let token = match cache.cache().lookup(resource).cloned() {
            None => {
                debug!(%user_id, %resource, "no cached token for resource");
                None
            }
            Some(cached) if !cached.expires_within(Utc::now(), self.refresh_skew) => {
                Some(AccessToken::from(&cached))
            }
            Some(cached) => self.refresh(&mut cache, cached).await?,
        };

        cache.after_access().await?;
        Ok(token)
    }
}
