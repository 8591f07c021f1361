//! Coordinated flushing across repositories.
//!
//! # Responsibility
//! - Flush every registered repository in registration order.
//! - Run one-shot callbacks after a successful pass.
//!
//! # Invariants
//! - Cross-repository dependencies (parent before child) are expressed by the
//!   caller through registration order only.
//! - Each callback runs at most once. Callbacks registered while a pass runs
//!   its callbacks are kept for the next pass.
//! - A failed repository flush ends the pass; callbacks stay registered.

use crate::repo::{FlushReport, ManagedRepository, RepoResult};
use log::{error, info};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Registry of flushable repositories and pending post-flush callbacks.
#[derive(Default)]
pub struct RepositoryManager {
    repositories: Mutex<Vec<Arc<dyn ManagedRepository>>>,
    callbacks: Mutex<Vec<Callback>>,
}

impl RepositoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a repository to the flush order.
    pub fn register_repository(&self, repository: Arc<dyn ManagedRepository>) {
        info!(
            "event=manager_register module=manager status=ok collection={}",
            repository.collection()
        );
        self.repositories.lock().push(repository);
    }

    /// Queues a callback for the end of the next successful pass.
    pub fn register_callback(&self, callback: impl FnOnce() + Send + 'static) {
        self.callbacks.lock().push(Box::new(callback));
    }

    pub fn repository_count(&self) -> usize {
        self.repositories.lock().len()
    }

    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Flushes all repositories, then runs and clears the callbacks.
    ///
    /// # Errors
    /// Returns the first repository flush error. Repositories after the
    /// failing one are not flushed in this pass.
    pub fn process_queues(&self) -> RepoResult<FlushReport> {
        let started_at = Instant::now();
        let repositories = self.repositories.lock().clone();

        let mut total = FlushReport::default();
        for repository in &repositories {
            match repository.process_queues() {
                Ok(report) => total.merge(report),
                Err(err) => {
                    error!(
                        "event=manager_flush module=manager status=error collection={} error={}",
                        repository.collection(),
                        err
                    );
                    return Err(err);
                }
            }
        }

        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        let callback_count = callbacks.len();
        for callback in callbacks {
            callback();
        }

        info!(
            "event=manager_flush module=manager status=ok repositories={} callbacks={} updated={} created={} deleted={} duration_ms={}",
            repositories.len(),
            callback_count,
            total.updated,
            total.created,
            total.deleted,
            started_at.elapsed().as_millis()
        );
        Ok(total)
    }
}
