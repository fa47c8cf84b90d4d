//! redb table definitions for the drive robot store.
//!
//! Every table uses `(partition, row)` tuple keys and raw `&[u8]` values, so
//! one `RedbTable` implementation serves all of them.

use redb::TableDefinition;

/// Definition type shared by every entity table.
pub type EntityTable = TableDefinition<'static, (&'static str, &'static str), &'static [u8]>;

/// Serialized per-user token caches, partition `tokenCache`, row = user id.
pub const TOKEN_CACHE: EntityTable = TableDefinition::new("tokenCache");

/// Webhook subscription and delta cursor state.
pub const SYNC_STATE: EntityTable = TableDefinition::new("syncState");

pub const ALL_TABLES: [EntityTable; 2] = [TOKEN_CACHE, SYNC_STATE];
