//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Probe the file lock so a busy database fails at open time.
//!
//! # Invariants
//! - Direct connections keep an exclusive lock until closed.
//! - Returned shared connections wait up to `SHARED_BUSY_TIMEOUT` on locks.

use super::config::{ConnectionMode, StoreConfig};
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, ErrorCode};
use std::path::Path;
use std::time::{Duration, Instant};

const SHARED_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the database file described by `config`.
///
/// # Side effects
/// - Creates `config.data_dir` when missing.
/// - Emits `db_open` logging events with duration and status.
///
/// # Errors
/// - `DbError::StoreAccess` when another connection holds the file.
/// - `DbError::Io` when the data directory cannot be created.
pub fn open_db(config: &StoreConfig) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode=file connection={}",
        config.connection
    );

    match open_file(config) {
        Ok(conn) => {
            info!(
                "event=db_open module=db status=ok mode=file connection={} duration_ms={}",
                config.connection,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=file duration_ms={} error_code={} error={}",
                started_at.elapsed().as_millis(),
                err.code(),
                err
            );
            Err(err)
        }
    }
}

/// Opens an ephemeral in-memory database.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let conn = Connection::open_in_memory().map_err(|err| {
        error!(
            "event=db_open module=db status=error mode=memory error_code=db_open_failed error={}",
            err
        );
        DbError::from(err)
    })?;
    conn.busy_timeout(SHARED_BUSY_TIMEOUT)?;
    info!("event=db_open module=db status=ok mode=memory");
    Ok(conn)
}

fn open_file(config: &StoreConfig) -> DbResult<Connection> {
    config.validate()?;
    std::fs::create_dir_all(config.data_dir()).map_err(|source| DbError::Io {
        path: config.data_dir.clone(),
        source,
    })?;

    let path = config.db_path();
    let conn = Connection::open(&path)?;
    acquire_access(&conn, config.connection, &path)?;
    Ok(conn)
}

fn acquire_access(conn: &Connection, mode: ConnectionMode, path: &Path) -> DbResult<()> {
    // Probe without waiting; a held lock must surface as an access error.
    conn.busy_timeout(Duration::ZERO)?;

    let probe = match mode {
        ConnectionMode::Direct => {
            conn.query_row("PRAGMA locking_mode = EXCLUSIVE;", [], |row| {
                row.get::<_, String>(0)
            })?;
            "BEGIN EXCLUSIVE; COMMIT;"
        }
        ConnectionMode::Shared => "BEGIN IMMEDIATE; COMMIT;",
    };
    conn.execute_batch(probe)
        .map_err(|err| classify_lock_error(err, path))?;

    conn.busy_timeout(SHARED_BUSY_TIMEOUT)?;
    Ok(())
}

fn classify_lock_error(err: rusqlite::Error, path: &Path) -> DbError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => DbError::StoreAccess {
            path: path.to_path_buf(),
            source: err,
        },
        _ => DbError::Sqlite(err),
    }
}
