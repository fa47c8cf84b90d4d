//! Subscription lifecycle manager.
//!
//! Per user the robot is either unregistered (no record) or active (one
//! record pairing a live webhook subscription with a delta cursor).
//! `activate` creates or renews; `deactivate` tears down. Both acquire the
//! user's token first and then run under the user's lock, so concurrent calls
//! for one user are applied one after the other instead of racing past the
//! existing-record lookup. The identity provider may share the same lock
//! registry; it is never entered while the manager holds a user lock.
//!
//! Local state is written only after the remote subscription exists, and is
//! removed on deactivate whatever the remote outcome. A remote subscription
//! orphaned by a failure expires on its own at the end of its window.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use driverobot_auth::{AccessToken, IdentityProvider};
use driverobot_core::config::{RobotConfig, SubscriptionConfig};
use driverobot_core::{SubscriptionId, UserLocks};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{LifecycleError, LifecycleResult};
use crate::record::{SubscriptionRecord, SubscriptionRecordStore};
use crate::remote::{DeltaCursorApi, Subscription, SubscriptionSpec, WebhookSubscriptionApi};

/// Outcome of [`SubscriptionLifecycleManager::activate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateResult {
    pub success: bool,
    pub subscription_id: Option<SubscriptionId>,
    pub expiration: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl ActivateResult {
    fn activated(subscription: Subscription) -> Self {
        Self {
            success: true,
            subscription_id: Some(subscription.id),
            expiration: Some(subscription.expiration),
            error_message: None,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            success: false,
            subscription_id: None,
            expiration: None,
            error_message: Some(message),
        }
    }
}

/// Outcome of [`SubscriptionLifecycleManager::deactivate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivateResult {
    pub success: bool,
    pub message: String,
}

pub const NOTHING_TO_DEACTIVATE: &str = "The robot was not active for this account, nothing to deactivate.";
pub const DEACTIVATED: &str = "The robot has been deactivated for this account.";

enum Deactivation {
    NothingActive,
    Removed,
}

pub struct SubscriptionLifecycleManager {
    identity: Arc<dyn IdentityProvider>,
    webhooks: Arc<dyn WebhookSubscriptionApi>,
    delta: Arc<dyn DeltaCursorApi>,
    records: SubscriptionRecordStore,
    settings: SubscriptionConfig,
    /// Resource tokens are requested for.
    token_resource: String,
    locks: UserLocks,
}

impl SubscriptionLifecycleManager {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        webhooks: Arc<dyn WebhookSubscriptionApi>,
        delta: Arc<dyn DeltaCursorApi>,
        records: SubscriptionRecordStore,
        settings: SubscriptionConfig,
        token_resource: &str,
    ) -> Self {
        Self {
            identity,
            webhooks,
            delta,
            records,
            settings,
            token_resource: token_resource.to_string(),
            locks: UserLocks::new(),
        }
    }

    pub fn from_config(
        config: &RobotConfig,
        identity: Arc<dyn IdentityProvider>,
        webhooks: Arc<dyn WebhookSubscriptionApi>,
        delta: Arc<dyn DeltaCursorApi>,
        records: SubscriptionRecordStore,
    ) -> Self {
        Self::new(
            identity,
            webhooks,
            delta,
            records,
            config.subscription.clone(),
            &config.identity.graph_resource,
        )
    }

    /// Use `locks` for the activate/deactivate critical section. Safe to
    /// share with the identity provider.
    pub fn with_locks(mut self, locks: UserLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn records(&self) -> &SubscriptionRecordStore {
        &self.records
    }

    /// Create or renew the user's subscription and reset its delta cursor.
    pub async fn activate(&self, user_id: &str) -> ActivateResult {
        let outcome = match self.acquire_token(user_id).await {
            Ok(token) => {
                let _guard = self.locks.lock(user_id).await;
                self.try_activate(user_id, &token).await
            }
            Err(e) => Err(e),
        };
        match outcome {
            Ok(subscription) => {
                info!(%user_id, subscription_id = %subscription.id, expiration = %subscription.expiration, "robot activated");
                ActivateResult::activated(subscription)
            }
            Err(e) => {
                warn!(%user_id, error = %e, "robot activation failed");
                ActivateResult::failed(e.to_string())
            }
        }
    }

    /// Remove the user's subscription, remotely if possible and locally always.
    pub async fn deactivate(&self, user_id: &str) -> DeactivateResult {
        let outcome = match self.acquire_token(user_id).await {
            Ok(token) => {
                let _guard = self.locks.lock(user_id).await;
                self.try_deactivate(user_id, &token).await
            }
            Err(e) => Err(e),
        };
        match outcome {
            Ok(Deactivation::NothingActive) => DeactivateResult {
                success: true,
                message: NOTHING_TO_DEACTIVATE.to_string(),
            },
            Ok(Deactivation::Removed) => {
                info!(%user_id, "robot deactivated");
                DeactivateResult {
                    success: true,
                    message: DEACTIVATED.to_string(),
                }
            }
            Err(e) => {
                warn!(%user_id, error = %e, "robot deactivation failed");
                DeactivateResult {
                    success: false,
                    message: e.to_string(),
                }
            }
        }
    }

    async fn acquire_token(&self, user_id: &str) -> LifecycleResult<AccessToken> {
        self.identity
            .acquire_token_silent(&self.token_resource, user_id)
            .await?
            .ok_or_else(|| LifecycleError::AuthenticationUnavailable(user_id.to_string()))
    }

    fn subscription_spec(&self, now: DateTime<Utc>) -> SubscriptionSpec {
        SubscriptionSpec {
            change_type: self.settings.change_type,
            notification_url: self.settings.notification_url.clone(),
            resource: self.settings.resource.clone(),
            expiration: now + self.settings.expiration_window(),
            client_state: self.settings.client_state.clone(),
        }
    }

    async fn try_activate(
        &self,
        user_id: &str,
        token: &AccessToken,
    ) -> LifecycleResult<Subscription> {
        let existing = self.records.find_by_user_id(user_id).await;
        let spec = self.subscription_spec(Utc::now());

        let mut renewed = None;
        if let Some(record) = &existing {
            match self
                .webhooks
                .update(token, &record.subscription_id, &spec)
                .await
            {
                Ok(subscription) => {
                    debug!(%user_id, subscription_id = %subscription.id, "subscription renewed");
                    renewed = Some(subscription);
                }
                // A transient failure here can leave the old subscription
                // alive remotely next to the new one until it expires.
                Err(e) => warn!(
                    %user_id,
                    subscription_id = %record.subscription_id,
                    error = %e,
                    "renewal failed, creating a new subscription"
                ),
            }
        }

        let subscription = match renewed {
            Some(subscription) => subscription,
            None => {
                let created = self
                    .webhooks
                    .create(token, &spec)
                    .await
                    .map_err(LifecycleError::RemoteCreateFailed)?;
                debug!(%user_id, subscription_id = %created.id, "subscription created");
                created
            }
        };

        let cursor = self
            .delta
            .latest_cursor(token, &self.settings.resource)
            .await
            .map_err(LifecycleError::DeltaCursorFailed)?;

        let record = SubscriptionRecord {
            subscription_id: subscription.id.clone(),
            user_id: user_id.to_string(),
            delta_cursor: cursor,
            expiration: Some(subscription.expiration),
        };
        self.records.upsert(&record).await?;

        self.remove_superseded(user_id, &record.subscription_id).await;
        Ok(subscription)
    }

    /// Records are keyed by subscription id, so a replaced subscription
    /// leaves its row behind. Drop every row of the user except `current`.
    /// Failures are logged and retried by the next activation.
    async fn remove_superseded(&self, user_id: &str, current: &str) {
        for stale in self.records.find_all_by_user_id(user_id).await {
            if stale.subscription_id == current {
                continue;
            }
            match self.records.delete(&stale).await {
                Ok(_) => {
                    debug!(%user_id, subscription_id = %stale.subscription_id, "superseded record removed")
                }
                Err(e) => warn!(
                    %user_id,
                    subscription_id = %stale.subscription_id,
                    error = %e,
                    "failed to remove superseded record"
                ),
            }
        }
    }

    async fn try_deactivate(
        &self,
        user_id: &str,
        token: &AccessToken,
    ) -> LifecycleResult<Deactivation> {
        // Normally one record; more only if an earlier superseded-row
        // cleanup failed.
        let records = self.records.find_all_by_user_id(user_id).await;
        if records.is_empty() {
            debug!(%user_id, "no subscription record");
            return Ok(Deactivation::NothingActive);
        }

        for record in &records {
            if let Err(e) = self.webhooks.delete(token, &record.subscription_id).await {
                warn!(
                    %user_id,
                    subscription_id = %record.subscription_id,
                    error = %e,
                    "remote unsubscribe failed, removing local record anyway"
                );
            }
            self.records.delete(record).await?;
        }
        Ok(Deactivation::Removed)
    }
}
