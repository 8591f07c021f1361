//! Store location and connection settings.

use super::DbError;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File stem used when no database name is configured.
const DEFAULT_DB_NAME: &str = "data";

/// How a connection shares the database file with other connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Holds an exclusive lock for the whole connection lifetime.
    Direct,
    /// Takes locks per transaction and waits on busy locks.
    #[default]
    Shared,
}

impl ConnectionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Shared => "shared",
        }
    }
}

impl Display for ConnectionMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionMode {
    type Err = DbError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "direct" | "exclusive" => Ok(Self::Direct),
            "shared" => Ok(Self::Shared),
            other => Err(DbError::InvalidConfig(format!(
                "unsupported connection mode `{other}`; expected direct|shared"
            ))),
        }
    }
}

/// Location and sharing mode of a file-backed store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub db_name: String,
    pub connection: ConnectionMode,
}

impl StoreConfig {
    /// Creates a config for `<data_dir>/data.db` in shared mode.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            db_name: DEFAULT_DB_NAME.to_string(),
            connection: ConnectionMode::default(),
        }
    }

    pub fn with_db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }

    pub fn with_connection(mut self, connection: ConnectionMode) -> Self {
        self.connection = connection;
        self
    }

    /// Full path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.db", self.db_name))
    }

    pub fn data_dir(&self) -> &Path {
        self.data_dir.as_path()
    }

    /// Rejects empty names and names that would escape `data_dir`.
    pub fn validate(&self) -> Result<(), DbError> {
        let name = self.db_name.trim();
        if name.is_empty() {
            return Err(DbError::InvalidConfig("db_name cannot be empty".to_string()));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(DbError::InvalidConfig(format!(
                "db_name must be a plain file stem, got `{name}`"
            )));
        }
        Ok(())
    }
}
