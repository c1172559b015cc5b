// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queue drain and failed-request management.
//!
//! The engine replays pending mutations against the remote endpoint and
//! decides, per entry, whether it is done, conflicted, or quarantined:
//!
//! | Response                       | Local effect                       | Queue effect      |
//! |--------------------------------|------------------------------------|-------------------|
//! | success                        | reconcile temporary record (POST)  | dequeued (1)      |
//! | 404 on PUT / PATCH             | local record deleted, conflict     | dequeued          |
//! | 404 on DELETE                  | none                               | dequeued          |
//! | anything else                  | none                               | moved to failed   |
//!
//! (1) A creation edited while in flight stays queued as a `PUT` carrying
//! the edit.
//!
//! Entries touching the same local record replay in queue order. Entries
//! touching different records replay concurrently.

use std::collections::HashMap;

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tally_core::{
    merge_fields, without_temp_marker, ClockSource, FailedRequest, LocalStore, Method,
    QueuedRequest, RecordId, RequestTarget, SystemClock, TempId, TempIdGenerator,
};
use tokio_util::sync::CancellationToken;

use super::connectivity::ConnectivityMonitor;
use super::events::{Notice, QueueStatus, SyncEvents};
use super::queue::Queues;
use super::reconcile::{reconcile, Reconciled};
use super::remote::{RemoteEndpoint, RemoteError};
use crate::error::{Error, Result};

/// Counts from one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainSummary {
    /// Confirmed by the server (including deletes of already-gone records).
    pub synced: usize,
    /// Updates dropped because the record no longer exists remotely.
    pub conflicts: usize,
    /// Moved to the failed queue.
    pub failed: usize,
    /// Left pending because local storage could not be updated, or
    /// withdrawn locally while in flight.
    pub skipped: usize,
}

impl DrainSummary {
    pub fn attempted(&self) -> usize {
        self.synced + self.conflicts + self.failed + self.skipped
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Synced => self.synced += 1,
            Outcome::Conflict => self.conflicts += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Synced,
    Conflict,
    Failed,
    Skipped,
}

/// Offline-first sync engine.
///
/// Owns the durable queues, the remote endpoint and the notification hub.
/// All methods take `&self`; wrap the engine in an `Arc` to share it
/// between the drain loop and callers enqueueing writes.
pub struct SyncEngine<S, R, C: ClockSource = SystemClock> {
    queues: Queues<S>,
    remote: R,
    clock: C,
    temp_ids: TempIdGenerator<C>,
    events: SyncEvents,
    connectivity: ConnectivityMonitor,
}

impl<S: LocalStore, R: RemoteEndpoint> SyncEngine<S, R, SystemClock> {
    pub fn new(store: S, remote: R, connectivity: ConnectivityMonitor) -> Self {
        SyncEngine::with_clock(store, remote, connectivity, SystemClock)
    }
}

impl<S: LocalStore, R: RemoteEndpoint, C: ClockSource + Clone> SyncEngine<S, R, C> {
    /// Create an engine with a custom clock (for testing).
    pub fn with_clock(store: S, remote: R, connectivity: ConnectivityMonitor, clock: C) -> Self {
        let engine = SyncEngine {
            queues: Queues::new(store),
            remote,
            temp_ids: TempIdGenerator::with_clock(clock.clone()),
            clock,
            events: SyncEvents::new(),
            connectivity,
        };
        engine.publish_status();
        engine
    }
}

impl<S: LocalStore, R: RemoteEndpoint, C: ClockSource> SyncEngine<S, R, C> {
    pub fn events(&self) -> &SyncEvents {
        &self.events
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub(crate) fn queues(&self) -> &Queues<S> {
        &self.queues
    }

    /// Allocate a fresh temporary id for an offline creation.
    pub fn next_temp_id(&self) -> TempId {
        self.temp_ids.next_id()
    }

    /// Persist a mutation for later replay.
    ///
    /// Works the same online or offline; replay happens on the next drain.
    pub fn add_to_queue(&self, request: QueuedRequest) -> Result<i64> {
        let id = self.queues.enqueue(&request)?;
        tracing::debug!(id, method = %request.method, url = %request.url, "queued request");
        self.publish_status();
        Ok(id)
    }

    pub fn pending_requests(&self) -> Result<Vec<QueuedRequest>> {
        Ok(self.queues.pending()?)
    }

    pub fn failed_requests(&self) -> Result<Vec<FailedRequest>> {
        Ok(self.queues.failed()?)
    }

    pub fn failed_request(&self, id: i64) -> Result<FailedRequest> {
        self.queues
            .get_failed(id)?
            .ok_or(Error::FailedRequestNotFound(id))
    }

    pub fn pending_count(&self) -> Result<usize> {
        Ok(self.queues.pending_count()?)
    }

    pub fn failed_count(&self) -> Result<usize> {
        Ok(self.queues.failed_count()?)
    }

    /// Snapshot both queues straight from storage.
    pub fn status(&self) -> Result<QueueStatus> {
        Ok(self.queues.status()?)
    }

    /// Push the current queue snapshot to status subscribers.
    pub fn publish_status(&self) {
        // Failures are logged by the queue layer; subscribers keep the last
        // good snapshot.
        if let Ok(status) = self.queues.status() {
            self.events.publish_status(status);
        }
    }

    /// Replay every pending request once.
    ///
    /// Never fails: each entry's outcome is applied to storage and reported
    /// through notices, and storage failures leave the entry for the next
    /// pass.
    pub async fn process_queue(&self) -> DrainSummary {
        let pending = match self.queues.pending() {
            Ok(pending) => pending,
            Err(_) => return DrainSummary::default(),
        };
        if pending.is_empty() {
            return DrainSummary::default();
        }

        tracing::info!(count = pending.len(), "draining pending queue");
        let groups = group_by_target(pending);
        let outcomes = join_all(groups.into_iter().map(|group| self.replay_group(group))).await;

        let mut summary = DrainSummary::default();
        for outcome in outcomes.into_iter().flatten() {
            summary.record(outcome);
        }
        self.publish_status();
        tracing::info!(
            synced = summary.synced,
            conflicts = summary.conflicts,
            failed = summary.failed,
            skipped = summary.skipped,
            "drain finished"
        );
        summary
    }

    async fn replay_group(&self, group: Vec<QueuedRequest>) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(group.len());
        for request in group {
            outcomes.push(self.replay(request).await);
        }
        outcomes
    }

    async fn replay(&self, request: QueuedRequest) -> Outcome {
        let Some(id) = request.id else {
            tracing::warn!(url = %request.url, "skipping queued request without id");
            return Outcome::Skipped;
        };

        let response = self
            .remote
            .request(request.method, &request.url, &request.payload)
            .await;
        let outcome = match response {
            Ok(body) => self.on_success(id, &request, body),
            Err(err) => self.on_failure(id, &request, &err),
        };
        self.publish_status();
        outcome
    }

    fn on_success(&self, id: i64, request: &QueuedRequest, body: Value) -> Outcome {
        let settled = self
            .queues
            .with_store("settle request", |s| s.transaction(|s| settle(s, id, request, body)));
        let Ok(settled) = settled else {
            return Outcome::Skipped;
        };

        if let Some((entity, temp)) = request.reconcile_target() {
            match settled {
                Settled::Dequeued(Some(Reconciled::Replaced { permanent })) => {
                    tracing::info!(%entity, %temp, %permanent, "temporary record confirmed");
                }
                // The server has the record; replaying would create it twice.
                Settled::Dequeued(Some(Reconciled::Unidentified { reason })) => {
                    tracing::warn!(%entity, %temp, %reason, "keeping temporary record");
                }
                Settled::Dequeued(_) => {}
                Settled::Requeued { permanent } => {
                    tracing::info!(
                        %entity,
                        %temp,
                        %permanent,
                        "temporary record confirmed; edits made in flight re-queued"
                    );
                }
            }
        }

        self.events.notify(Notice::success(format!(
            "{} {} synced",
            request.method,
            describe(request)
        )));
        Outcome::Synced
    }

    fn on_failure(&self, id: i64, request: &QueuedRequest, err: &RemoteError) -> Outcome {
        if err.is_not_found() {
            match request.method {
                Method::Put | Method::Patch => return self.on_lost_update(id, request),
                Method::Delete => {
                    tracing::debug!(url = %request.url, "delete target already gone");
                    return match self.queues.dequeue(id) {
                        Ok(()) => Outcome::Synced,
                        Err(_) => Outcome::Skipped,
                    };
                }
                Method::Post => {}
            }
        }

        let message = err.to_string();
        match self.queues.quarantine(request, &message, self.clock.now()) {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::debug!(id, url = %request.url, "request withdrawn while in flight");
                return Outcome::Skipped;
            }
            Err(_) => return Outcome::Skipped,
        }
        self.events.notify(Notice::error(format!(
            "{} {} failed: {message}",
            request.method,
            describe(request)
        )));
        Outcome::Failed
    }

    /// The record was deleted remotely while we held an update for it.
    fn on_lost_update(&self, id: i64, request: &QueuedRequest) -> Outcome {
        let target = request.effective_target();
        let dropped = self.queues.with_store("drop conflicted record", |s| {
            s.transaction(|s| {
                if let Some(RequestTarget { entity, record }) = &target {
                    s.delete_record(*entity, record)?;
                }
                s.delete_pending(id)
            })
        });
        if dropped.is_err() {
            return Outcome::Skipped;
        }
        self.events.notify(Notice::conflict(format!(
            "your changes to {} could not be saved: it was deleted on the server, \
             so the local copy was removed",
            describe(request)
        )));
        Outcome::Conflict
    }

    /// Move one failed request back to the end of the pending queue.
    pub fn retry_failed_request(&self, request: &FailedRequest) -> Result<i64> {
        let result = self.queues.requeue(request);
        self.publish_status();
        let pending_id = result?;
        tracing::info!(pending_id, url = %request.url, "re-queued failed request");
        Ok(pending_id)
    }

    /// Move every failed request back to the pending queue, in order.
    ///
    /// Returns how many were moved. Each entry moves on its own, so a
    /// storage failure part way leaves the rest in the failed queue.
    pub fn retry_all_failed_requests(&self) -> Result<usize> {
        let failed = self.queues.failed()?;
        if failed.is_empty() {
            return Ok(0);
        }

        let result = failed
            .iter()
            .try_for_each(|request| self.queues.requeue(request).map(drop));
        self.publish_status();
        result?;
        tracing::info!(count = failed.len(), "re-queued all failed requests");
        Ok(failed.len())
    }

    /// Drop a failed request. Dropping an unknown id is not an error.
    pub fn delete_failed_request(&self, id: i64) -> Result<()> {
        let result = self.queues.dismiss(id);
        self.publish_status();
        Ok(result?)
    }

    /// Drain whenever connectivity comes back, until `cancel` fires.
    ///
    /// Drains once immediately if already online. Transitions that happen
    /// while a drain is running collapse into a single follow-up drain.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut online = self.connectivity.subscribe();
        let initially_online = *online.borrow_and_update();
        if initially_online {
            self.process_queue().await;
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                changed = online.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let now_online = *online.borrow_and_update();
                    if now_online {
                        self.process_queue().await;
                    }
                }
            }
        }
    }
}

/// How a confirmed request left the pending queue.
#[derive(Debug)]
enum Settled {
    Dequeued(Option<Reconciled>),
    /// A creation rewritten while in flight, now queued as a `PUT`.
    Requeued { permanent: RecordId },
}

/// Apply a successful response to local storage and the pending queue.
///
/// If a creation's queued row changed while its `POST` was in flight, the
/// edit is applied to the permanent record and the row becomes a `PUT`
/// against the permanent id, keeping its place in the queue.
fn settle<S: LocalStore>(
    store: &mut S,
    id: i64,
    request: &QueuedRequest,
    body: Value,
) -> tally_core::Result<Settled> {
    let Some((entity, temp)) = request.reconcile_target() else {
        store.delete_pending(id)?;
        return Ok(Settled::Dequeued(None));
    };

    let current = store.get_pending(id)?;
    let reconciled = reconcile(store, entity, temp, body)?;
    let edited_in_flight = match (&reconciled, &current) {
        (Reconciled::Replaced { permanent }, Some(row)) if row.payload != request.payload => {
            Some(permanent.clone())
        }
        _ => None,
    };
    let (Some(permanent), Some(current)) = (edited_in_flight, current) else {
        store.delete_pending(id)?;
        return Ok(Settled::Dequeued(Some(reconciled)));
    };

    let edited = without_temp_marker(current.payload);
    if let Some(mut record) = store.get_record(entity, &permanent)? {
        merge_fields(&mut record.body, &edited);
        store.update_record(entity, &record)?;
    }
    let url = format!("{}/{}", request.url.trim_end_matches('/'), permanent);
    let mut update =
        QueuedRequest::new(Method::Put, url, edited).with_target(entity, permanent.clone());
    update.id = Some(id);
    store.update_pending(&update)?;
    Ok(Settled::Requeued { permanent })
}

/// Human-readable name of what a request touches.
fn describe(request: &QueuedRequest) -> String {
    match request.effective_target() {
        Some(target) => format!("{} {}", target.entity, target.record),
        None => request.url.clone(),
    }
}

/// Split a snapshot into per-record groups, keeping queue order within and
/// between groups. Entries with no known target each get their own group.
pub(crate) fn group_by_target(requests: Vec<QueuedRequest>) -> Vec<Vec<QueuedRequest>> {
    let mut groups: Vec<Vec<QueuedRequest>> = Vec::new();
    let mut index: HashMap<RequestTarget, usize> = HashMap::new();

    for request in requests {
        match request.effective_target() {
            Some(target) => match index.get(&target) {
                Some(&slot) => groups[slot].push(request),
                None => {
                    index.insert(target, groups.len());
                    groups.push(vec![request]);
                }
            },
            None => groups.push(vec![request]),
        }
    }
    groups
}
