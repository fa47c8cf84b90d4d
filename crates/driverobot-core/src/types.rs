//! Shared types used across the drive robot crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a signed-in user (the directory object id).
pub type UserId = String;

/// Identifier the drive provider assigns to a webhook subscription.
pub type SubscriptionId = String;

/// Kind of change a webhook subscription is notified about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Created,
    #[default]
    Updated,
    Deleted,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Created => "created",
            ChangeType::Updated => "updated",
            ChangeType::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_type_wire_names() {
        assert_eq!(serde_json::to_string(&ChangeType::Updated).unwrap(), "\"updated\"");
        let parsed: ChangeType = serde_json::from_str("\"deleted\"").unwrap();
        assert_eq!(parsed, ChangeType::Deleted);
        assert_eq!(ChangeType::Created.to_string(), "created");
    }
}
