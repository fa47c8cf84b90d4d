//! Lifecycle error types.

use thiserror::Error;

/// Failure reported by a remote drive API.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transport failure: {0}")]
    Transport(String),
}

/// Errors that end an activate or deactivate attempt.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no signed-in session for user {0}, sign in again")]
    AuthenticationUnavailable(String),

    #[error("token acquisition failed: {0}")]
    Identity(#[from] driverobot_auth::AuthError),

    #[error("failed to create subscription: {0}")]
    RemoteCreateFailed(RemoteError),

    #[error("failed to fetch delta cursor: {0}")]
    DeltaCursorFailed(RemoteError),

    #[error("sync state store error: {0}")]
    Store(#[from] driverobot_state::StoreError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
