//! Deferred-write repositories over a `Store`.
//!
//! # Responsibility
//! - Buffer create/update/delete calls in per-kind queues.
//! - Apply buffered mutations to the store only on an explicit flush.
//!
//! # Invariants
//! - A flush applies updates, then creates, then deletes. This order is fixed.
//! - A successful mutating call only guarantees the mutation is queued.
//! - Store failures surface from `process_queues`/`dispose`, never retried.
//! - One flush per repository at a time; a concurrent flush is rejected with
//!   `RepoError::FlushInProgress`.

use crate::model::record::{Record, RecordId};
use crate::store::{Predicate, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod cached_repo;
pub mod data_repo;
pub mod queue;

pub type RepoResult<T> = Result<T, RepoError>;

/// Flush stage in which a store call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPhase {
    Update,
    Create,
    Delete,
}

impl FlushPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Create => "create",
            Self::Delete => "delete",
        }
    }
}

impl Display for FlushPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum RepoError {
    Store(StoreError),
    /// The store rejected a queued mutation. The failed item is dropped;
    /// items behind it stay queued for the next flush.
    Flush {
        collection: &'static str,
        phase: FlushPhase,
        record_id: RecordId,
        source: StoreError,
    },
    FlushInProgress {
        collection: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Flush {
                collection,
                phase,
                record_id,
                source,
            } => write!(
                f,
                "flush of `{collection}` failed in {phase} phase for record {record_id}: {source}"
            ),
            Self::FlushInProgress { collection } => {
                write!(f, "a flush of `{collection}` is already running")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Flush { source, .. } => Some(source),
            Self::FlushInProgress { .. } => None,
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Store calls made by one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub updated: usize,
    pub created: usize,
    pub deleted: usize,
    /// Updates or deletes whose target id was not in the store.
    pub missed: usize,
}

impl FlushReport {
    /// True when the flush made no store calls, applied or missed.
    pub fn is_empty(&self) -> bool {
        self.updated + self.created + self.deleted + self.missed == 0
    }

    pub fn merge(&mut self, other: FlushReport) {
        self.updated += other.updated;
        self.created += other.created;
        self.deleted += other.deleted;
        self.missed += other.missed;
    }
}

/// Queue lengths at the time of the call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    pub creates: usize,
    /// Reserved read-side slot; nothing enqueues here yet.
    pub reads: usize,
    pub updates: usize,
    pub deletes: usize,
}

impl PendingCounts {
    pub fn total(&self) -> usize {
        self.creates + self.reads + self.updates + self.deletes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryState {
    Idle,
    Pending,
    Flushing,
}

/// Read/write capability shared by the plain and cached repositories.
///
/// Reads never observe the queues; whether they observe the cache mirror is
/// up to the implementation.
pub trait RecordRepository<T: Record> {
    /// Stamps `created = updated = now` and queues an insert.
    ///
    /// The returned id is whatever `item` carried; identities are assigned
    /// by the store at flush time.
    fn create(&self, item: T) -> T;

    /// Stamps every item with one clock reading and queues the inserts.
    fn create_many(&self, items: Vec<T>) -> Vec<T>;

    fn get(&self, id: RecordId) -> RepoResult<Option<T>>;

    /// Predicate query answered by the store (persisted state only).
    fn find(&self, predicate: &Predicate<'_, T>) -> RepoResult<Vec<T>>;

    fn get_all(&self) -> RepoResult<Vec<T>>;

    /// Stamps `updated = now` and queues a replace.
    fn update(&self, item: T) -> T;

    /// Queues a delete of `item`'s id.
    fn delete(&self, item: &T);

    /// Queues a delete for every persisted record.
    fn delete_all(&self) -> RepoResult<()>;

    /// Largest persisted id, `0` when empty. Ignores queued creates.
    fn max_id(&self) -> RepoResult<RecordId>;
}

/// Flush capability driven by `RepositoryManager`.
pub trait ManagedRepository: Send + Sync {
    fn collection(&self) -> &'static str;

    fn process_queues(&self) -> RepoResult<FlushReport>;

    /// Flushes once. The repository should not be used afterwards.
    fn dispose(&self) -> RepoResult<FlushReport>;

    fn state(&self) -> RepositoryState;
}
