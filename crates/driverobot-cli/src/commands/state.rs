//! `driverobot subscriptions | show | token-cache` — read-only views of the
//! persisted robot state.

use std::fmt::Write as _;

use anyhow::Context;
use chrono::{DateTime, Utc};
use driverobot_auth::PersistentTokenCache;
use driverobot_core::RobotConfig;
use driverobot_state::StoreHandles;
use driverobot_subscriptions::{SubscriptionRecord, SubscriptionRecordStore};
use serde::Serialize;
use tracing::debug;

use crate::Format;

fn open_store(config: &RobotConfig) -> anyhow::Result<StoreHandles> {
    let path = config.storage.database_path();
    debug!(?path, "opening robot state");
    StoreHandles::open(&path).with_context(|| format!("opening {}", path.display()))
}

pub async fn subscriptions(config: &RobotConfig, format: Format) -> anyhow::Result<()> {
    let handles = open_store(config)?;
    let records = SubscriptionRecordStore::new(handles.sync_state).list().await?;
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        Format::Text => print!("{}", format_records(&records)),
    }
    Ok(())
}

pub async fn show(config: &RobotConfig, user: &str, format: Format) -> anyhow::Result<()> {
    let handles = open_store(config)?;
    let record = SubscriptionRecordStore::new(handles.sync_state)
        .find_by_user_id(user)
        .await;
    match (format, record) {
        (Format::Json, record) => println!("{}", serde_json::to_string_pretty(&record)?),
        (Format::Text, Some(record)) => print!("{}", format_records(&[record])),
        (Format::Text, None) => println!("robot is not active for {user}"),
    }
    Ok(())
}

/// Token cache summary. Never includes token material.
#[derive(Debug, Serialize)]
pub struct TokenCacheSummary {
    pub user_id: String,
    pub last_write: Option<DateTime<Utc>>,
    pub resources: Vec<ResourceSummary>,
}

#[derive(Debug, Serialize)]
pub struct ResourceSummary {
    pub resource: String,
    pub expires_on: DateTime<Utc>,
    pub has_refresh_token: bool,
}

pub fn summarize(cache: &PersistentTokenCache) -> TokenCacheSummary {
    TokenCacheSummary {
        user_id: cache.user_id().to_string(),
        last_write: cache.last_write(),
        resources: cache
            .cache()
            .tokens()
            .map(|t| ResourceSummary {
                resource: t.resource.clone(),
                expires_on: t.expires_on,
                has_refresh_token: t.refresh_token.is_some(),
            })
            .collect(),
    }
}

pub async fn token_cache(config: &RobotConfig, user: &str, format: Format) -> anyhow::Result<()> {
    let handles = open_store(config)?;
    let cache = PersistentTokenCache::load(user, handles.token_cache).await;
    let summary = summarize(&cache);
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        Format::Text => print!("{}", format_token_cache(&summary)),
    }
    Ok(())
}

pub fn format_records(records: &[SubscriptionRecord]) -> String {
    if records.is_empty() {
        return "no active subscriptions\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "{:<40} {:<40} {:<25}", "SUBSCRIPTION", "USER", "EXPIRES");
    for r in records {
        let expires = r
            .expiration
            .map(|e| e.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "{:<40} {:<40} {:<25}", r.subscription_id, r.user_id, expires);
    }
    out
}

pub fn format_token_cache(summary: &TokenCacheSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "user:       {}", summary.user_id);
    match summary.last_write {
        Some(at) => {
            let _ = writeln!(out, "last write: {}", at.to_rfc3339());
        }
        None => {
            let _ = writeln!(out, "last write: never (no persisted cache)");
        }
    }
    for r in &summary.resources {
        let refresh = if r.has_refresh_token { "refreshable" } else { "no refresh token" };
        let _ = writeln!(out, "  {} expires {} ({refresh})", r.resource, r.expires_on.to_rfc3339());
    }
    out
}
