//! Contracts for the remote drive APIs the robot drives.
//!
//! Both traits take the caller's bearer token explicitly; implementations are
//! thin HTTP wrappers and live outside this crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use driverobot_auth::AccessToken;
use driverobot_core::{ChangeType, SubscriptionId};
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// Body of a create or renew request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSpec {
    pub change_type: ChangeType,
    pub notification_url: String,
    pub resource: String,
    #[serde(rename = "expirationDateTime")]
    pub expiration: DateTime<Utc>,
    /// Echoed back on every notification so the receiver can verify origin.
    pub client_state: String,
}

/// A subscription as the provider reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub expiration: DateTime<Utc>,
}

#[async_trait]
pub trait WebhookSubscriptionApi: Send + Sync {
    async fn create(
        &self,
        token: &AccessToken,
        spec: &SubscriptionSpec,
    ) -> Result<Subscription, RemoteError>;

    /// Extend an existing subscription with `spec`'s expiration.
    async fn update(
        &self,
        token: &AccessToken,
        id: &str,
        spec: &SubscriptionSpec,
    ) -> Result<Subscription, RemoteError>;

    async fn delete(&self, token: &AccessToken, id: &str) -> Result<(), RemoteError>;
}

#[async_trait]
pub trait DeltaCursorApi: Send + Sync {
    /// Cursor anchored at "now" for `resource`'s change feed.
    async fn latest_cursor(
        &self,
        token: &AccessToken,
        resource: &str,
    ) -> Result<String, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_serializes_with_provider_field_names() {
        let spec = SubscriptionSpec {
            change_type: ChangeType::Updated,
            notification_url: "https://robot/notify".to_string(),
            resource: "/me/drive/root".to_string(),
            expiration: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            client_state: "state".to_string(),
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["changeType"], "updated");
        assert_eq!(json["notificationUrl"], "https://robot/notify");
        assert_eq!(json["clientState"], "state");
        assert!(json.get("expirationDateTime").is_some());
    }
}
