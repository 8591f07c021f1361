//! SQLite bootstrap: configuration, connection open and access checks.
//!
//! # Responsibility
//! - Resolve the database file location from `StoreConfig`.
//! - Open and configure SQLite connections for the document store.
//!
//! # Invariants
//! - A database held exclusively by another connection is reported as
//!   `DbError::StoreAccess` at open time, never later.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod config;
mod open;

pub use config::{ConnectionMode, StoreConfig};
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The database file is locked by another process or connection.
    StoreAccess {
        path: PathBuf,
        source: rusqlite::Error,
    },
    InvalidConfig(String),
}

impl DbError {
    /// Stable machine-readable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "db_sqlite_failed",
            Self::Io { .. } => "db_io_failed",
            Self::StoreAccess { .. } => "db_access_denied",
            Self::InvalidConfig(_) => "db_invalid_config",
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "i/o failure at `{}`: {source}", path.display()),
            Self::StoreAccess { path, .. } => write!(f, "can't access {}", path.display()),
            Self::InvalidConfig(message) => write!(f, "invalid store config: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::StoreAccess { source, .. } => Some(source),
            Self::InvalidConfig(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
