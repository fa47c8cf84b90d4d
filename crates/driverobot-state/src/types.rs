//! Key and entity types shared by every store implementation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Two-part entity key: a partition groups related rows, the row key is
/// unique within its partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub partition: String,
    pub row: String,
}

impl EntityKey {
    pub fn new(partition: impl Into<String>, row: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            row: row.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition, self.row)
    }
}

/// A raw row as held by a [`KeyedStore`](crate::KeyedStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntity {
    pub key: EntityKey,
    pub value: Vec<u8>,
}
