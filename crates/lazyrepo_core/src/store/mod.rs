//! Document store contract consumed by repositories.
//!
//! # Responsibility
//! - Define point/predicate CRUD and collection lifecycle operations.
//! - Keep storage format and query execution behind one trait.
//!
//! # Invariants
//! - Predicates are opaque to callers of the store; only the store evaluates them.
//! - `insert` assigns an identity when the record carries `UNASSIGNED_ID`.
//! - `update`/`delete_by_id` never create records.

use crate::db::DbError;
use crate::model::record::{Record, RecordId};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod sqlite;

#[cfg(test)]
pub(crate) mod recording;

pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Boolean expression over a record, evaluated by the store.
pub type Predicate<'a, T> = dyn Fn(&T) -> bool + 'a;

#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Serialization(serde_json::Error),
    /// Collection or field name is not a plain identifier.
    InvalidName(String),
    /// Record identity is not valid for the requested operation.
    InvalidIdentity(RecordId),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "record serialization failed: {err}"),
            Self::InvalidName(name) => write!(f, "invalid collection or field name `{name}`"),
            Self::InvalidIdentity(id) => write!(f, "invalid record identity: {id}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::InvalidName(_) | Self::InvalidIdentity(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Embedded document store holding one collection per record type.
///
/// Implementations own their concurrency discipline; repositories share one
/// store through `Arc` and call it from whichever thread drives them.
pub trait Store: Send + Sync {
    /// Makes sure an (empty, if new) durable collection exists for `T`.
    fn ensure_collection<T: Record>(&self) -> StoreResult<()>;

    /// Persists a new record and returns the identity in effect.
    fn insert<T: Record>(&self, item: &T) -> StoreResult<RecordId>;

    fn insert_many<T: Record>(&self, items: &[T]) -> StoreResult<Vec<RecordId>>;

    /// Inserts or replaces by identity.
    fn upsert<T: Record>(&self, item: &T) -> StoreResult<RecordId>;

    fn upsert_many<T: Record>(&self, items: &[T]) -> StoreResult<Vec<RecordId>>;

    /// Replaces an existing record. Returns `false` when no record has that id.
    fn update<T: Record>(&self, item: &T) -> StoreResult<bool>;

    /// Removes a record. Returns `false` when it was not found.
    fn delete_by_id<T: Record>(&self, id: RecordId) -> StoreResult<bool>;

    /// Removes every matching record and returns how many were removed.
    fn delete_where<T: Record>(&self, predicate: &Predicate<'_, T>) -> StoreResult<usize>;

    fn get_by_id<T: Record>(&self, id: RecordId) -> StoreResult<Option<T>>;

    /// First match in id order, if any.
    fn get_where<T: Record>(&self, predicate: &Predicate<'_, T>) -> StoreResult<Option<T>>;

    fn get_all<T: Record>(&self) -> StoreResult<Vec<T>>;

    fn get_all_where<T: Record>(&self, predicate: &Predicate<'_, T>) -> StoreResult<Vec<T>>;

    /// Creates an index on a top-level record field if it does not exist.
    fn ensure_index<T: Record>(&self, field: &str, unique: bool) -> StoreResult<()>;

    /// Drops and recreates an index on a top-level record field.
    fn rebuild_index<T: Record>(&self, field: &str, unique: bool) -> StoreResult<()>;

    /// Compacts the underlying storage.
    fn rebuild_collection(&self) -> StoreResult<()>;

    /// Application-defined schema version.
    fn version(&self) -> StoreResult<u32>;

    fn set_version(&self, version: u32) -> StoreResult<()>;

    /// Releases the store connection.
    fn dispose(self) -> StoreResult<()>
    where
        Self: Sized;
}
