//! robot.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::ChangeType;

/// Longest expiration window the drive provider accepts for a webhook
/// subscription on a drive root.
pub const MAX_EXPIRATION_DAYS: u32 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotConfig {
    #[serde(default)]
    pub identity: IdentityConfig,
    pub subscription: SubscriptionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_authority")]
    pub authority: String,
    #[serde(default)]
    pub client_id: String,
    /// Resource the robot requests tokens for.
    #[serde(default = "default_graph_resource")]
    pub graph_resource: String,
    /// Cached tokens expiring within this many seconds are refreshed.
    #[serde(default = "default_refresh_skew_secs")]
    pub refresh_skew_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    pub notification_url: String,
    #[serde(default = "default_watched_resource")]
    pub resource: String,
    #[serde(default)]
    pub change_type: ChangeType,
    #[serde(default = "default_client_state")]
    pub client_state: String,
    #[serde(default = "default_expiration_days")]
    pub expiration_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_authority() -> String {
    "https://login.microsoftonline.com/common/".to_string()
}

fn default_graph_resource() -> String {
    "https://graph.microsoft.com".to_string()
}

fn default_refresh_skew_secs() -> u64 {
    300
}

fn default_watched_resource() -> String {
    "/me/drive/root".to_string()
}

fn default_client_state() -> String {
    "driverobot".to_string()
}

fn default_expiration_days() -> u32 {
    3
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/driverobot")
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            authority: default_authority(),
            client_id: String::new(),
            graph_resource: default_graph_resource(),
            refresh_skew_secs: default_refresh_skew_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl SubscriptionConfig {
    /// Settings for the given callback URL with every other field defaulted.
    pub fn with_notification_url(url: &str) -> Self {
        Self {
            notification_url: url.to_string(),
            resource: default_watched_resource(),
            change_type: ChangeType::default(),
            client_state: default_client_state(),
            expiration_days: default_expiration_days(),
        }
    }

    pub fn expiration_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.expiration_days))
    }
}

impl StorageConfig {
    /// Path of the redb file holding both the token cache and sync state tables.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("driverobot.redb")
    }
}

impl RobotConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RobotConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let sub = &self.subscription;
        if sub.notification_url.trim().is_empty() {
            anyhow::bail!("subscription.notification_url must not be empty");
        }
        if sub.resource.trim().is_empty() {
            anyhow::bail!("subscription.resource must not be empty");
        }
        if sub.expiration_days == 0 {
            anyhow::bail!("subscription.expiration_days must be at least 1");
        }
        if sub.expiration_days > MAX_EXPIRATION_DAYS {
            anyhow::bail!(
                "subscription.expiration_days must be at most {MAX_EXPIRATION_DAYS}, got {}",
                sub.expiration_days
            );
        }
        if self.identity.graph_resource.trim().is_empty() {
            anyhow::bail!("identity.graph_resource must not be empty");
        }
        Ok(())
    }
}
