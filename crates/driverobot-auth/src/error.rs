//! Auth error types.

use thiserror::Error;

/// Errors raised by the token cache and identity provider.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token cache store error: {0}")]
    Store(#[from] driverobot_state::StoreError),

    #[error("token cache format error: {0}")]
    CacheFormat(String),

    #[error("token endpoint error: {0}")]
    TokenEndpoint(#[from] TokenEndpointError),
}

/// Failure reported by the remote token issuer.
#[derive(Debug, Clone, Error)]
pub enum TokenEndpointError {
    /// The refresh token was rejected; only an interactive sign-in can recover.
    #[error("grant rejected: {0}")]
    InvalidGrant(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

pub type AuthResult<T> = Result<T, AuthError>;
