//! driverobot-state — keyed entity store for the drive robot.
//!
//! Backed by [redb](https://docs.rs/redb). Rows are addressed by a
//! `(partition, row)` key and hold opaque bytes; typed records are layered on
//! top through [`RecordTable`].
//!
//! # Architecture
//!
//! ```text
//! StoreHandles
//!   ├── token_cache: Arc<dyn KeyedStore>   (redb table "tokenCache")
//!   └── sync_state:  Arc<dyn KeyedStore>   (redb table "syncState")
//! ```
//!
//! Handles are opened once at process start and passed to every component
//! that persists state. Single-row upsert and delete are atomic (one redb
//! write transaction each).

pub mod error;
pub mod keyed;
pub mod record;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use keyed::{EntityPredicate, KeyedStore};
pub use record::{RecordTable, TableRecord};
pub use store::{RedbStore, RedbTable, StoreHandles};
pub use types::{EntityKey, StoredEntity};
