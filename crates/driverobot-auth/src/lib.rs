//! driverobot-auth — per-user OAuth token cache and silent token acquisition.
//!
//! # Architecture
//!
//! ```text
//! SilentTokenProvider (IdentityProvider)
//!   ├── UserLocks                 one refresh per user at a time
//!   ├── PersistentTokenCache      hydrate on load, write back when dirty
//!   │     └── TokenCache          in-memory tokens + has_state_changed
//!   └── TokenEndpoint             remote refresh-token redemption
//! ```
//!
//! A cache access that only reads costs one store lookup and no writes; a
//! refresh that rotates a token costs exactly one upsert.

pub mod cache;
pub mod error;
pub mod identity;
pub mod persistent;

pub use cache::{CachedToken, TokenCache};
pub use error::{AuthError, AuthResult, TokenEndpointError};
pub use identity::{AccessToken, IdentityProvider, SilentTokenProvider, TokenEndpoint, TokenResponse};
pub use persistent::{CachedTokenBlob, PersistentTokenCache, TOKEN_CACHE_PARTITION};
