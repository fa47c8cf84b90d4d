//! Per-user mutual exclusion.
//!
//! Read-modify-write sequences over a user's persisted state (token cache
//! refresh, subscription activation) must not interleave for the same user.
//! `UserLocks` hands out one async mutex per user id; distinct users never
//! contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-user async locks. Cheap to clone; clones share the registry.
#[derive(Clone, Default)]
pub struct UserLocks {
    slots: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

/// Held for the duration of a per-user critical section.
pub struct UserGuard {
    _guard: OwnedMutexGuard<()>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_id`'s state.
    pub async fn lock(&self, user_id: &str) -> UserGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            // Drop slots nobody is holding or waiting on.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        UserGuard {
            _guard: slot.lock_owned().await,
        }
    }

    /// Number of users with a held or contended lock.
    pub fn active(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.values().filter(|slot| Arc::strong_count(slot) > 1).count()
    }
}
