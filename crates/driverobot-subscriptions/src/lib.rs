//! driverobot-subscriptions — webhook subscription lifecycle for the drive robot.
//!
//! # Architecture
//!
//! ```text
//! SubscriptionLifecycleManager
//!   ├── IdentityProvider          silent token per call
//!   ├── WebhookSubscriptionApi    create / renew / delete remotely
//!   ├── DeltaCursorApi            "latest" change-feed cursor
//!   └── SubscriptionRecordStore   one record per active user
//! ```
//!
//! Activate: token → existing record? → renew, else create → fresh cursor →
//! upsert record. Deactivate: token → record? → best-effort remote delete →
//! delete record.

pub mod error;
pub mod manager;
pub mod record;
pub mod remote;

pub use error::{LifecycleError, LifecycleResult, RemoteError};
pub use manager::{ActivateResult, DeactivateResult, SubscriptionLifecycleManager};
pub use record::{SubscriptionRecord, SubscriptionRecordStore, SUBSCRIPTION_PARTITION};
pub use remote::{DeltaCursorApi, Subscription, SubscriptionSpec, WebhookSubscriptionApi};
