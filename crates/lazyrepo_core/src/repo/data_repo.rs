//! Queue-backed repository with store passthrough reads.
//!
//! # Responsibility
//! - Stamp and enqueue mutations without touching the store.
//! - Drain queues into the store on `process_queues`.
//!
//! # Invariants
//! - Drain order is update queue, then create queue, then delete queue.
//! - Reads go straight to the store and never see queued mutations.
//! - A failed store call aborts the flush; nothing is rolled back or retried.

use super::queue::MutationQueue;
use super::{
    FlushPhase, FlushReport, ManagedRepository, PendingCounts, RecordRepository, RepoError,
    RepoResult, RepositoryState,
};
use crate::model::record::{now_epoch_ms, Record, RecordId, UNASSIGNED_ID};
use crate::store::{Predicate, Store, StoreResult};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Deferred-write repository for one record type.
pub struct DataRepository<T: Record, S: Store> {
    store: Arc<S>,
    create_queue: MutationQueue<T>,
    read_queue: MutationQueue<T>,
    update_queue: MutationQueue<T>,
    delete_queue: MutationQueue<RecordId>,
    flushing: AtomicBool,
}

impl<T: Record, S: Store> DataRepository<T, S> {
    /// Binds a repository to `store`, creating the collection if it is new.
    pub fn new(store: Arc<S>) -> RepoResult<Self> {
        store.ensure_collection::<T>()?;
        info!(
            "event=repo_open module=repo status=ok collection={}",
            T::COLLECTION
        );

        Ok(Self {
            store,
            create_queue: MutationQueue::new(),
            read_queue: MutationQueue::new(),
            update_queue: MutationQueue::new(),
            delete_queue: MutationQueue::new(),
            flushing: AtomicBool::new(false),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn pending(&self) -> PendingCounts {
        PendingCounts {
            creates: self.create_queue.len(),
            reads: self.read_queue.len(),
            updates: self.update_queue.len(),
            deletes: self.delete_queue.len(),
        }
    }

    /// Flushes like `process_queues`, reporting every successful insert to
    /// `on_insert` with the record as queued and the id the store assigned.
    pub(crate) fn flush_with(&self, on_insert: &dyn Fn(&T, RecordId)) -> RepoResult<FlushReport> {
        let Some(_guard) = FlushGuard::acquire(&self.flushing) else {
            warn!(
                "event=flush module=repo status=rejected collection={} reason=flush_in_progress",
                T::COLLECTION
            );
            return Err(RepoError::FlushInProgress {
                collection: T::COLLECTION,
            });
        };

        if self.pending().total() == 0 {
            return Ok(FlushReport::default());
        }

        let started_at = Instant::now();
        let result = self.drain_all(on_insert);
        match &result {
            Ok(report) => info!(
                "event=flush module=repo status=ok collection={} updated={} created={} deleted={} missed={} duration_ms={}",
                T::COLLECTION,
                report.updated,
                report.created,
                report.deleted,
                report.missed,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=flush module=repo status=error collection={} duration_ms={} error={}",
                T::COLLECTION,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    pub(crate) fn dispose_with(&self, on_insert: &dyn Fn(&T, RecordId)) -> RepoResult<FlushReport> {
        info!(
            "event=repo_dispose module=repo status=start collection={}",
            T::COLLECTION
        );
        self.flush_with(on_insert)
    }

    fn drain_all(&self, on_insert: &dyn Fn(&T, RecordId)) -> RepoResult<FlushReport> {
        let mut report = FlushReport::default();

        let (updated, missed) = self.drain(&self.update_queue, FlushPhase::Update, |item| {
            (item.id(), self.store.update(&item))
        })?;
        report.updated = updated;
        report.missed += missed;

        let (created, _) = self.drain(&self.create_queue, FlushPhase::Create, |item| {
            let result = self.store.insert(&item).map(|assigned| {
                debug!(
                    "event=flush_insert module=repo collection={} assigned_id={assigned}",
                    T::COLLECTION
                );
                on_insert(&item, assigned);
                true
            });
            (item.id(), result)
        })?;
        report.created = created;

        let (deleted, missed) = self.drain(&self.delete_queue, FlushPhase::Delete, |id| {
            (id, self.store.delete_by_id::<T>(id))
        })?;
        report.deleted = deleted;
        report.missed += missed;

        Ok(report)
    }

    /// Pops until the queue reports empty. Returns `(applied, missed)`.
    fn drain<Q>(
        &self,
        queue: &MutationQueue<Q>,
        phase: FlushPhase,
        apply: impl Fn(Q) -> (RecordId, StoreResult<bool>),
    ) -> RepoResult<(usize, usize)> {
        let mut applied = 0;
        let mut missed = 0;

        while let Some(entry) = queue.pop() {
            match apply(entry) {
                (_, Ok(true)) => applied += 1,
                (record_id, Ok(false)) => {
                    missed += 1;
                    warn!(
                        "event=flush_miss module=repo collection={} phase={phase} record_id={record_id}",
                        T::COLLECTION
                    );
                }
                (record_id, Err(source)) => {
                    return Err(RepoError::Flush {
                        collection: T::COLLECTION,
                        phase,
                        record_id,
                        source,
                    });
                }
            }
        }

        Ok((applied, missed))
    }
}

impl<T: Record, S: Store> RecordRepository<T> for DataRepository<T, S> {
    fn create(&self, mut item: T) -> T {
        item.meta_mut().stamp_created(now_epoch_ms());
        self.create_queue.push(item.clone());
        item
    }

    fn create_many(&self, mut items: Vec<T>) -> Vec<T> {
        let now = now_epoch_ms();
        for item in &mut items {
            item.meta_mut().stamp_created(now);
            self.create_queue.push(item.clone());
        }
        items
    }

    fn get(&self, id: RecordId) -> RepoResult<Option<T>> {
        Ok(self.store.get_by_id(id)?)
    }

    fn find(&self, predicate: &Predicate<'_, T>) -> RepoResult<Vec<T>> {
        Ok(self.store.get_all_where(predicate)?)
    }

    fn get_all(&self) -> RepoResult<Vec<T>> {
        Ok(self.store.get_all()?)
    }

    fn update(&self, mut item: T) -> T {
        item.meta_mut().stamp_updated(now_epoch_ms());
        self.update_queue.push(item.clone());
        item
    }

    fn delete(&self, item: &T) {
        self.delete_queue.push(item.id());
    }

    fn delete_all(&self) -> RepoResult<()> {
        let persisted = self.store.get_all::<T>()?;
        for item in &persisted {
            self.delete_queue.push(item.id());
        }
        debug!(
            "event=delete_all module=repo status=queued collection={} count={}",
            T::COLLECTION,
            persisted.len()
        );
        Ok(())
    }

    fn max_id(&self) -> RepoResult<RecordId> {
        Ok(self
            .store
            .get_all::<T>()?
            .iter()
            .map(Record::id)
            .max()
            .unwrap_or(UNASSIGNED_ID))
    }
}

impl<T: Record, S: Store> ManagedRepository for DataRepository<T, S> {
    fn collection(&self) -> &'static str {
        T::COLLECTION
    }

    fn process_queues(&self) -> RepoResult<FlushReport> {
        self.flush_with(&|_, _| {})
    }

    fn dispose(&self) -> RepoResult<FlushReport> {
        self.dispose_with(&|_, _| {})
    }

    fn state(&self) -> RepositoryState {
        if self.flushing.load(Ordering::Acquire) {
            RepositoryState::Flushing
        } else if self.pending().total() > 0 {
            RepositoryState::Pending
        } else {
            RepositoryState::Idle
        }
    }
}

/// Marks a repository as flushing for the guard's lifetime.
struct FlushGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlushGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
