//! Store wrapper that records every call, for flush-order assertions.

use super::{Predicate, SqliteStore, Store, StoreError, StoreResult};
use crate::model::record::{Record, RecordId, RecordMeta};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Note {
    #[serde(flatten)]
    pub(crate) meta: RecordMeta,
    pub(crate) title: String,
}

impl Note {
    pub(crate) fn new(title: &str) -> Self {
        Self {
            meta: RecordMeta::default(),
            title: title.to_string(),
        }
    }

    pub(crate) fn persisted(id: RecordId, title: &str) -> Self {
        Self {
            meta: RecordMeta::with_id(id),
            title: title.to_string(),
        }
    }
}

impl Record for Note {
    const COLLECTION: &'static str = "notes";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Insert(RecordId),
    Update(RecordId),
    Delete(RecordId),
    Read,
}

pub(crate) struct RecordingStore {
    inner: SqliteStore,
    calls: Mutex<Vec<Call>>,
    reject: Mutex<Option<Call>>,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().expect("in-memory store should open"),
            calls: Mutex::new(Vec::new()),
            reject: Mutex::new(None),
        }
    }

    pub(crate) fn seeded<T: Record>(items: &[T]) -> Self {
        let store = Self::new();
        store
            .inner
            .insert_many(items)
            .expect("seed records should insert");
        store
    }

    /// Makes the next call equal to `call` fail with `InvalidIdentity`.
    pub(crate) fn reject(&self, call: Call) {
        *self.reject.lock() = Some(call);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: Call) -> StoreResult<()> {
        let mut reject = self.reject.lock();
        if *reject == Some(call) {
            reject.take();
            let id = match call {
                Call::Insert(id) | Call::Update(id) | Call::Delete(id) => id,
                Call::Read => 0,
            };
            return Err(StoreError::InvalidIdentity(id));
        }
        self.calls.lock().push(call);
        Ok(())
    }
}

impl Store for RecordingStore {
    fn ensure_collection<T: Record>(&self) -> StoreResult<()> {
        self.inner.ensure_collection::<T>()
    }

    fn insert<T: Record>(&self, item: &T) -> StoreResult<RecordId> {
        self.record(Call::Insert(item.id()))?;
        self.inner.insert(item)
    }

    fn insert_many<T: Record>(&self, items: &[T]) -> StoreResult<Vec<RecordId>> {
        for item in items {
            self.record(Call::Insert(item.id()))?;
        }
        self.inner.insert_many(items)
    }

    fn upsert<T: Record>(&self, item: &T) -> StoreResult<RecordId> {
        self.record(Call::Insert(item.id()))?;
        self.inner.upsert(item)
    }

    fn upsert_many<T: Record>(&self, items: &[T]) -> StoreResult<Vec<RecordId>> {
        for item in items {
            self.record(Call::Insert(item.id()))?;
        }
        self.inner.upsert_many(items)
    }

    fn update<T: Record>(&self, item: &T) -> StoreResult<bool> {
        self.record(Call::Update(item.id()))?;
        self.inner.update(item)
    }

    fn delete_by_id<T: Record>(&self, id: RecordId) -> StoreResult<bool> {
        self.record(Call::Delete(id))?;
        self.inner.delete_by_id::<T>(id)
    }

    fn delete_where<T: Record>(&self, predicate: &Predicate<'_, T>) -> StoreResult<usize> {
        self.inner.delete_where(predicate)
    }

    fn get_by_id<T: Record>(&self, id: RecordId) -> StoreResult<Option<T>> {
        self.record(Call::Read)?;
        self.inner.get_by_id(id)
    }

    fn get_where<T: Record>(&self, predicate: &Predicate<'_, T>) -> StoreResult<Option<T>> {
        self.record(Call::Read)?;
        self.inner.get_where(predicate)
    }

    fn get_all<T: Record>(&self) -> StoreResult<Vec<T>> {
        self.record(Call::Read)?;
        self.inner.get_all()
    }

    fn get_all_where<T: Record>(&self, predicate: &Predicate<'_, T>) -> StoreResult<Vec<T>> {
        self.record(Call::Read)?;
        self.inner.get_all_where(predicate)
    }

    fn ensure_index<T: Record>(&self, field: &str, unique: bool) -> StoreResult<()> {
        self.inner.ensure_index::<T>(field, unique)
    }

    fn rebuild_index<T: Record>(&self, field: &str, unique: bool) -> StoreResult<()> {
        self.inner.rebuild_index::<T>(field, unique)
    }

    fn rebuild_collection(&self) -> StoreResult<()> {
        self.inner.rebuild_collection()
    }

    fn version(&self) -> StoreResult<u32> {
        self.inner.version()
    }

    fn set_version(&self, version: u32) -> StoreResult<()> {
        self.inner.set_version(version)
    }

    fn dispose(self) -> StoreResult<()> {
        self.inner.dispose()
    }
}
