//! Deferred-write repositories over an embedded document store.
//!
//! Mutations are stamped and queued per record type, then applied to the
//! store in one explicit flush. `CachedDataRepository` also mirrors its
//! collection in memory for id lookups and listings.

pub mod db;
pub mod logging;
pub mod manager;
pub mod model;
pub mod repo;
pub mod store;

pub use db::{ConnectionMode, DbError, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig, LoggingError};
pub use manager::RepositoryManager;
pub use model::record::{now_epoch_ms, Record, RecordId, RecordMeta, UNASSIGNED_ID};
pub use repo::cached_repo::CachedDataRepository;
pub use repo::data_repo::DataRepository;
pub use repo::{
    FlushPhase, FlushReport, ManagedRepository, PendingCounts, RecordRepository, RepoError,
    RepoResult, RepositoryState,
};
pub use store::{Predicate, SqliteStore, Store, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
