//! Repository with an optimistic in-memory mirror of its collection.
//!
//! # Responsibility
//! - Answer id lookups and full listings from memory.
//! - Keep the mirror ahead of the store by applying mutations at enqueue time.
//!
//! # Invariants
//! - Every mutating call holds the mirror lock across enqueue + mirror update.
//! - Predicate queries bypass the mirror and only see persisted state.
//! - `delete_all` clears the whole mirror, including queued-but-unflushed
//!   creates whose deletes were never queued.
//! - `reset_cache` discards optimistic state; queued writes become visible
//!   again only after they are flushed and the mirror is reloaded.
//! - A flushed create that carried `UNASSIGNED_ID` moves the mirror's id-`0`
//!   entry to the store-assigned id.

use super::data_repo::DataRepository;
use super::{
    FlushReport, ManagedRepository, PendingCounts, RecordRepository, RepoResult, RepositoryState,
};
use crate::model::record::{compare_by_id, Record, RecordId, UNASSIGNED_ID};
use crate::store::{Predicate, Store};
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Deferred-write repository fronted by an id-keyed mirror.
pub struct CachedDataRepository<T: Record, S: Store> {
    repo: DataRepository<T, S>,
    mirror: Mutex<HashMap<RecordId, T>>,
}

impl<T: Record, S: Store> CachedDataRepository<T, S> {
    /// Binds to `store` and loads the full mirror once.
    pub fn new(store: Arc<S>) -> RepoResult<Self> {
        let cached = Self {
            repo: DataRepository::new(store)?,
            mirror: Mutex::new(HashMap::new()),
        };
        cached.reset_cache()?;
        Ok(cached)
    }

    /// Replaces the mirror with a fresh scan of the store.
    pub fn reset_cache(&self) -> RepoResult<()> {
        let mut mirror = self.mirror.lock();
        let persisted = self.repo.store().get_all::<T>()?;
        *mirror = persisted
            .into_iter()
            .map(|item| (item.id(), item))
            .collect();
        debug!(
            "event=cache_reset module=repo status=ok collection={} size={}",
            T::COLLECTION,
            mirror.len()
        );
        Ok(())
    }

    pub fn pending(&self) -> PendingCounts {
        self.repo.pending()
    }

    pub fn cached_len(&self) -> usize {
        self.mirror.lock().len()
    }

    pub fn store(&self) -> &Arc<S> {
        self.repo.store()
    }

    fn adopt_assigned_id(&self, flushed: &T, assigned: RecordId) {
        if flushed.meta().has_id() || assigned == UNASSIGNED_ID {
            return;
        }
        let mut mirror = self.mirror.lock();
        if let Some(mut item) = mirror.remove(&UNASSIGNED_ID) {
            item.meta_mut().id = assigned;
            mirror.insert(assigned, item);
            debug!(
                "event=cache_rekey module=repo status=ok collection={} assigned_id={assigned}",
                T::COLLECTION
            );
        }
    }
}

impl<T: Record, S: Store> RecordRepository<T> for CachedDataRepository<T, S> {
    /// Keeps the first mirror entry on key collisions, so several unflushed
    /// creates sharing id `0` resolve to the earliest one until reloaded.
    fn create(&self, item: T) -> T {
        let mut mirror = self.mirror.lock();
        let item = self.repo.create(item);
        mirror.entry(item.id()).or_insert_with(|| item.clone());
        item
    }

    fn create_many(&self, items: Vec<T>) -> Vec<T> {
        let mut mirror = self.mirror.lock();
        let items = self.repo.create_many(items);
        for item in &items {
            mirror.entry(item.id()).or_insert_with(|| item.clone());
        }
        items
    }

    fn get(&self, id: RecordId) -> RepoResult<Option<T>> {
        Ok(self.mirror.lock().get(&id).cloned())
    }

    fn find(&self, predicate: &Predicate<'_, T>) -> RepoResult<Vec<T>> {
        self.repo.find(predicate)
    }

    /// Snapshot of the mirror ordered by id.
    fn get_all(&self) -> RepoResult<Vec<T>> {
        let mut items: Vec<T> = self.mirror.lock().values().cloned().collect();
        items.sort_by(compare_by_id);
        Ok(items)
    }

    fn update(&self, item: T) -> T {
        let mut mirror = self.mirror.lock();
        let item = self.repo.update(item);
        mirror.insert(item.id(), item.clone());
        item
    }

    fn delete(&self, item: &T) {
        let mut mirror = self.mirror.lock();
        self.repo.delete(item);
        mirror.remove(&item.id());
    }

    fn delete_all(&self) -> RepoResult<()> {
        let mut mirror = self.mirror.lock();
        self.repo.delete_all()?;
        mirror.clear();
        Ok(())
    }

    fn max_id(&self) -> RepoResult<RecordId> {
        self.repo.max_id()
    }
}

impl<T: Record, S: Store> ManagedRepository for CachedDataRepository<T, S> {
    fn collection(&self) -> &'static str {
        T::COLLECTION
    }

    fn process_queues(&self) -> RepoResult<FlushReport> {
        self.repo
            .flush_with(&|flushed, assigned| self.adopt_assigned_id(flushed, assigned))
    }

    fn dispose(&self) -> RepoResult<FlushReport> {
        self.repo
            .dispose_with(&|flushed, assigned| self.adopt_assigned_id(flushed, assigned))
    }

    fn state(&self) -> RepositoryState {
        self.repo.state()
    }
}
