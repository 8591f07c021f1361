//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist records as JSON documents, one table per collection.
//! - Evaluate predicates in-process over decoded records.
//!
//! # Invariants
//! - Row columns (`id`, `created`, `updated`) are authoritative on read.
//! - Collection and field names must match `IDENTIFIER_RE` before reaching SQL.
//! - Every collection touched through this store exists as a table afterwards.

use super::{Predicate, Store, StoreError, StoreResult};
use crate::db::{open_db, open_db_in_memory, StoreConfig};
use crate::model::record::{Record, RecordId, UNASSIGNED_ID};
use log::{debug, info};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid identifier regex"));

struct Inner {
    conn: Connection,
    collections: HashSet<&'static str>,
}

impl Inner {
    fn table<T: Record>(&mut self) -> StoreResult<&'static str> {
        let name = T::COLLECTION;
        if self.collections.contains(name) {
            return Ok(name);
        }
        validate_identifier(name)?;

        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{name}\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created INTEGER NOT NULL DEFAULT 0,
                updated INTEGER NOT NULL DEFAULT 0,
                body TEXT NOT NULL
            );"
        ))?;
        self.collections.insert(name);
        debug!("event=collection_ready module=store status=ok collection={name}");
        Ok(name)
    }
}

/// Document store over a single SQLite connection.
///
/// The connection is serialized behind a mutex; callers on many threads share
/// one store through `Arc<SqliteStore>`.
pub struct SqliteStore {
    inner: Mutex<Inner>,
}

impl SqliteStore {
    /// Opens the file store described by `config`.
    ///
    /// Fails with `DbError::StoreAccess` (wrapped) when the file is locked.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db(config)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Mutex::new(Inner {
                conn,
                collections: HashSet::new(),
            }),
        }
    }

    fn load_all<T: Record>(&self) -> StoreResult<Vec<T>> {
        let mut inner = self.inner.lock();
        let table = inner.table::<T>()?;
        let mut stmt = inner.conn.prepare(&format!(
            "SELECT id, created, updated, body FROM \"{table}\" ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(decode_row(row)?);
        }
        Ok(items)
    }

    fn write_many<T: Record>(&self, items: &[T], upsert: bool) -> StoreResult<Vec<RecordId>> {
        let mut inner = self.inner.lock();
        let table = inner.table::<T>()?;
        let tx = inner.conn.transaction()?;
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            ids.push(write_row(&tx, table, item, upsert)?);
        }
        tx.commit()?;
        Ok(ids)
    }
}

impl Store for SqliteStore {
    fn ensure_collection<T: Record>(&self) -> StoreResult<()> {
        self.inner.lock().table::<T>()?;
        Ok(())
    }

    fn insert<T: Record>(&self, item: &T) -> StoreResult<RecordId> {
        let mut inner = self.inner.lock();
        let table = inner.table::<T>()?;
        write_row(&inner.conn, table, item, false)
    }

    fn insert_many<T: Record>(&self, items: &[T]) -> StoreResult<Vec<RecordId>> {
        self.write_many(items, false)
    }

    fn upsert<T: Record>(&self, item: &T) -> StoreResult<RecordId> {
        let mut inner = self.inner.lock();
        let table = inner.table::<T>()?;
        write_row(&inner.conn, table, item, true)
    }

    fn upsert_many<T: Record>(&self, items: &[T]) -> StoreResult<Vec<RecordId>> {
        self.write_many(items, true)
    }

    fn update<T: Record>(&self, item: &T) -> StoreResult<bool> {
        let id = checked_id(item.id())?;
        let body = serde_json::to_string(item)?;
        let mut inner = self.inner.lock();
        let table = inner.table::<T>()?;
        let changed = inner.conn.execute(
            &format!("UPDATE \"{table}\" SET created = ?1, updated = ?2, body = ?3 WHERE id = ?4;"),
            params![item.created(), item.updated(), body, id],
        )?;
        Ok(changed > 0)
    }

    fn delete_by_id<T: Record>(&self, id: RecordId) -> StoreResult<bool> {
        let id = checked_id(id)?;
        let mut inner = self.inner.lock();
        let table = inner.table::<T>()?;
        let changed = inner
            .conn
            .execute(&format!("DELETE FROM \"{table}\" WHERE id = ?1;"), [id])?;
        Ok(changed > 0)
    }

    fn delete_where<T: Record>(&self, predicate: &Predicate<'_, T>) -> StoreResult<usize> {
        let doomed: Vec<RecordId> = self
            .load_all::<T>()?
            .iter()
            .filter(|item| predicate(*item))
            .map(Record::id)
            .collect();

        let mut inner = self.inner.lock();
        let table = inner.table::<T>()?;
        let tx = inner.conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare(&format!("DELETE FROM \"{table}\" WHERE id = ?1;"))?;
            for id in doomed {
                removed += stmt.execute([id])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    fn get_by_id<T: Record>(&self, id: RecordId) -> StoreResult<Option<T>> {
        let mut inner = self.inner.lock();
        let table = inner.table::<T>()?;
        let mut stmt = inner.conn.prepare(&format!(
            "SELECT id, created, updated, body FROM \"{table}\" WHERE id = ?1;"
        ))?;
        let body = stmt
            .query_row([id], |row| {
                Ok((
                    row.get::<_, RecordId>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .optional()?;

        body.map(|(id, created, updated, body)| decode_parts(id, created, updated, &body))
            .transpose()
    }

    fn get_where<T: Record>(&self, predicate: &Predicate<'_, T>) -> StoreResult<Option<T>> {
        Ok(self.load_all::<T>()?.into_iter().find(|item| predicate(item)))
    }

    fn get_all<T: Record>(&self) -> StoreResult<Vec<T>> {
        self.load_all()
    }

    fn get_all_where<T: Record>(&self, predicate: &Predicate<'_, T>) -> StoreResult<Vec<T>> {
        Ok(self
            .load_all::<T>()?
            .into_iter()
            .filter(|item| predicate(item))
            .collect())
    }

    fn ensure_index<T: Record>(&self, field: &str, unique: bool) -> StoreResult<()> {
        validate_identifier(field)?;
        let mut inner = self.inner.lock();
        let table = inner.table::<T>()?;
        inner.conn.execute_batch(&create_index_sql(table, field, unique))?;
        info!("event=index_ensure module=store status=ok collection={table} field={field} unique={unique}");
        Ok(())
    }

    fn rebuild_index<T: Record>(&self, field: &str, unique: bool) -> StoreResult<()> {
        validate_identifier(field)?;
        let mut inner = self.inner.lock();
        let table = inner.table::<T>()?;
        let tx = inner.conn.transaction()?;
        tx.execute_batch(&format!("DROP INDEX IF EXISTS \"{}\";", index_name(table, field)))?;
        tx.execute_batch(&create_index_sql(table, field, unique))?;
        tx.commit()?;
        info!("event=index_rebuild module=store status=ok collection={table} field={field} unique={unique}");
        Ok(())
    }

    fn rebuild_collection(&self) -> StoreResult<()> {
        self.inner.lock().conn.execute_batch("VACUUM;")?;
        info!("event=store_rebuild module=store status=ok");
        Ok(())
    }

    fn version(&self) -> StoreResult<u32> {
        let version = self
            .inner
            .lock()
            .conn
            .query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
        Ok(version)
    }

    fn set_version(&self, version: u32) -> StoreResult<()> {
        self.inner
            .lock()
            .conn
            .execute_batch(&format!("PRAGMA user_version = {version};"))?;
        info!("event=store_version module=store status=ok version={version}");
        Ok(())
    }

    fn dispose(self) -> StoreResult<()> {
        let inner = self.inner.into_inner();
        inner.conn.close().map_err(|(_, err)| StoreError::from(err))?;
        info!("event=store_dispose module=store status=ok");
        Ok(())
    }
}

fn write_row<T: Record>(
    conn: &Connection,
    table: &str,
    item: &T,
    upsert: bool,
) -> StoreResult<RecordId> {
    let body = serde_json::to_string(item)?;
    let id = item.meta().has_id().then_some(item.id());
    let conflict = if upsert {
        " ON CONFLICT(id) DO UPDATE SET
            created = excluded.created,
            updated = excluded.updated,
            body = excluded.body"
    } else {
        ""
    };

    conn.execute(
        &format!(
            "INSERT INTO \"{table}\" (id, created, updated, body) VALUES (?1, ?2, ?3, ?4){conflict};"
        ),
        params![id, item.created(), item.updated(), body],
    )?;

    Ok(id.unwrap_or_else(|| conn.last_insert_rowid()))
}

fn decode_row<T: Record>(row: &Row<'_>) -> StoreResult<T> {
    let body: String = row.get(3)?;
    decode_parts(row.get(0)?, row.get(1)?, row.get(2)?, &body)
}

fn decode_parts<T: Record>(
    id: RecordId,
    created: i64,
    updated: i64,
    body: &str,
) -> StoreResult<T> {
    let mut item: T = serde_json::from_str(body)?;
    let meta = item.meta_mut();
    meta.id = id;
    meta.created = created;
    meta.updated = updated;
    Ok(item)
}

fn checked_id(id: RecordId) -> StoreResult<RecordId> {
    if id <= UNASSIGNED_ID {
        return Err(StoreError::InvalidIdentity(id));
    }
    Ok(id)
}

fn validate_identifier(name: &str) -> StoreResult<()> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

fn index_name(table: &str, field: &str) -> String {
    format!("ix_{table}_{field}")
}

fn create_index_sql(table: &str, field: &str, unique: bool) -> String {
    format!(
        "CREATE {}INDEX IF NOT EXISTS \"{}\" ON \"{table}\" (json_extract(body, '$.{field}'));",
        if unique { "UNIQUE " } else { "" },
        index_name(table, field)
    )
}
