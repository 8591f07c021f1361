//! Record identity and timestamp model.
//!
//! # Responsibility
//! - Describe the minimal shape a typed record must expose to be managed.
//! - Apply create/update stamps with millisecond granularity.
//!
//! # Invariants
//! - `RecordId` `0` means the store has not assigned an identity yet.
//! - `updated` never moves backwards across stamps.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

/// Store-assigned record identity.
pub type RecordId = i64;

/// Identity value carried by records that were never persisted.
pub const UNASSIGNED_ID: RecordId = 0;

/// Identity and timestamps embedded in every record.
///
/// Record types usually embed this with `#[serde(flatten)]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Store-assigned id, `0` until the first successful insert.
    #[serde(default)]
    pub id: RecordId,
    /// Unix epoch milliseconds of the first create call.
    #[serde(default)]
    pub created: i64,
    /// Unix epoch milliseconds of the latest create/update call.
    #[serde(default)]
    pub updated: i64,
}

impl RecordMeta {
    /// Returns metadata carrying an explicit id and no timestamps.
    pub fn with_id(id: RecordId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Stamps a fresh record: `created = updated = now`.
    pub fn stamp_created(&mut self, now: i64) {
        self.created = now;
        self.updated = now;
    }

    /// Stamps a modification without ever moving `updated` backwards.
    pub fn stamp_updated(&mut self, now: i64) {
        self.updated = now.max(self.updated).max(self.created);
    }

    /// Returns whether the store has assigned an identity.
    pub fn has_id(&self) -> bool {
        self.id != UNASSIGNED_ID
    }
}

/// Contract for typed records managed by a repository.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection (table) name holding records of this type.
    const COLLECTION: &'static str;

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    fn id(&self) -> RecordId {
        self.meta().id
    }

    fn created(&self) -> i64 {
        self.meta().created
    }

    fn updated(&self) -> i64 {
        self.meta().updated
    }
}

/// Current UTC time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}

/// Orders records by ascending id.
pub fn compare_by_id<T: Record>(left: &T, right: &T) -> Ordering {
    left.id().cmp(&right.id())
}
