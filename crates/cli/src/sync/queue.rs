// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pending and failed queues on top of a shared [`LocalStore`].
//!
//! Every operation takes the store lock for the duration of one synchronous
//! call and never across an await point. Storage errors are logged here and
//! returned; callers decide whether to skip or abort.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tally_core::{EntityKind, FailedRequest, LocalStore, QueuedRequest, Result, TempId};

use super::events::QueueStatus;

/// Handle to the durable queues. Cloning shares the same store.
pub struct Queues<S> {
    store: Arc<Mutex<S>>,
}

impl<S> Clone for Queues<S> {
    fn clone(&self) -> Self {
        Queues {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LocalStore> Queues<S> {
    pub fn new(store: S) -> Self {
        Queues {
            store: Arc::new(Mutex::new(store)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        // A panic while holding the lock cannot leave the store half-written:
        // multi-step writes run in a transaction.
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` against the store, logging any failure under `operation`.
    pub fn with_store<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut S) -> Result<T>,
    ) -> Result<T> {
        let mut store = self.lock();
        f(&mut *store).inspect_err(|e| tracing::error!(operation, error = %e, "storage failure"))
    }

    /// Persist a new pending request and return its id.
    pub fn enqueue(&self, request: &QueuedRequest) -> Result<i64> {
        self.with_store("enqueue", |s| s.add_pending(request))
    }

    pub fn pending(&self) -> Result<Vec<QueuedRequest>> {
        self.with_store("list pending", |s| s.all_pending())
    }

    pub fn failed(&self) -> Result<Vec<FailedRequest>> {
        self.with_store("list failed", |s| s.all_failed())
    }

    pub fn get_failed(&self, id: i64) -> Result<Option<FailedRequest>> {
        self.with_store("get failed", |s| s.get_failed(id))
    }

    pub fn pending_count(&self) -> Result<usize> {
        self.with_store("count pending", |s| s.count_pending())
    }

    pub fn failed_count(&self) -> Result<usize> {
        self.with_store("count failed", |s| s.count_failed())
    }

    /// Remove a pending request after it has been resolved.
    pub fn dequeue(&self, id: i64) -> Result<()> {
        self.with_store("dequeue", |s| s.delete_pending(id))
    }

    /// Move a pending request into the failed queue.
    ///
    /// Both writes happen in one transaction. The stored row is quarantined
    /// rather than `request`, since it may have been rewritten while the
    /// request was in flight. Returns `None` if the row is already gone.
    pub fn quarantine(
        &self,
        request: &QueuedRequest,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        self.with_store("quarantine", |s| {
            s.transaction(|s| {
                let current = match request.id {
                    Some(id) => s.get_pending(id)?,
                    None => Some(request.clone()),
                };
                let Some(current) = current else {
                    return Ok(None);
                };
                let failed_id = s.add_failed(&FailedRequest::from_queued(&current, error, at))?;
                if let Some(id) = current.id {
                    s.delete_pending(id)?;
                }
                Ok(Some(failed_id))
            })
        })
    }

    /// Move a failed request back to the end of the pending queue.
    pub fn requeue(&self, failed: &FailedRequest) -> Result<i64> {
        self.with_store("requeue", |s| {
            s.transaction(|s| {
                let pending_id = s.add_pending(&failed.to_queued())?;
                if let Some(id) = failed.id {
                    s.delete_failed(id)?;
                }
                Ok(pending_id)
            })
        })
    }

    /// Drop a failed request without replaying it.
    pub fn dismiss(&self, id: i64) -> Result<()> {
        self.with_store("dismiss", |s| s.delete_failed(id))
    }

    /// Snapshot both queues.
    pub fn status(&self) -> Result<QueueStatus> {
        self.with_store("queue status", |s| {
            Ok(QueueStatus {
                pending: s.all_pending()?,
                failed: s.all_failed()?,
            })
        })
    }
}

/// Find the still-pending creation of a temporary record.
pub fn find_pending_create<S: LocalStore>(
    store: &S,
    entity: EntityKind,
    temp: TempId,
) -> Result<Option<QueuedRequest>> {
    Ok(store
        .all_pending()?
        .into_iter()
        .find(|req| req.reconcile_target() == Some((entity, temp))))
}

/// Find a quarantined creation of a temporary record.
pub fn find_failed_create<S: LocalStore>(
    store: &S,
    entity: EntityKind,
    temp: TempId,
) -> Result<Option<FailedRequest>> {
    Ok(store
        .all_failed()?
        .into_iter()
        .find(|req| req.to_queued().reconcile_target() == Some((entity, temp))))
}
