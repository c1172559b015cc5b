// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The local persistence contract consumed by the sync engine.
//!
//! Three kinds of collection live behind one store: the pending queue, the
//! failed queue, and one collection per [`EntityKind`]. Every operation
//! returns a [`Result`]; callers decide what a storage failure means.

use crate::entity::EntityKind;
use crate::error::Result;
use crate::record::{Record, RecordId};
use crate::request::{FailedRequest, QueuedRequest};

/// Durable, per-collection key/value storage.
///
/// Queue entries are keyed by a store-assigned integer and returned in
/// insertion order. Entity records are keyed by their [`RecordId`].
pub trait LocalStore: Send {
    /// Opens a (possibly nested) transaction.
    fn begin(&mut self) -> Result<()>;

    /// Makes everything since the matching [`LocalStore::begin`] permanent.
    fn commit(&mut self) -> Result<()>;

    /// Discards everything since the matching [`LocalStore::begin`].
    fn rollback(&mut self) -> Result<()>;

    /// Runs `f` so that either all of its writes land or none do.
    ///
    /// An error from `f` rolls the transaction back and is returned as is.
    fn transaction<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T>
    where
        Self: Sized,
    {
        self.begin()?;
        let result = f(self).and_then(|value| self.commit().map(|()| value));
        if result.is_err() {
            // The first error is the one worth reporting.
            let _ = self.rollback();
        }
        result
    }

    /// Appends a request to the pending queue and returns its assigned id.
    fn add_pending(&mut self, request: &QueuedRequest) -> Result<i64>;

    /// Overwrites a persisted pending request (matched by its id).
    fn update_pending(&mut self, request: &QueuedRequest) -> Result<()>;

    fn get_pending(&self, id: i64) -> Result<Option<QueuedRequest>>;

    /// Returns every pending request in insertion order.
    fn all_pending(&self) -> Result<Vec<QueuedRequest>>;

    /// Removes a pending request. Removing an absent id is not an error.
    fn delete_pending(&mut self, id: i64) -> Result<()>;

    fn clear_pending(&mut self) -> Result<()>;

    fn count_pending(&self) -> Result<usize>;

    /// Appends a request to the failed queue and returns its assigned id.
    fn add_failed(&mut self, request: &FailedRequest) -> Result<i64>;

    fn get_failed(&self, id: i64) -> Result<Option<FailedRequest>>;

    /// Returns every failed request in insertion order.
    fn all_failed(&self) -> Result<Vec<FailedRequest>>;

    /// Removes a failed request. Removing an absent id is not an error.
    fn delete_failed(&mut self, id: i64) -> Result<()>;

    fn clear_failed(&mut self) -> Result<()>;

    fn count_failed(&self) -> Result<usize>;

    /// Inserts a new record. Fails if a record with the same id exists.
    fn add_record(&mut self, entity: EntityKind, record: &Record) -> Result<()>;

    /// Replaces the body of an existing record.
    ///
    /// Fails with [`crate::Error::RecordNotFound`] if there is no such record.
    fn update_record(&mut self, entity: EntityKind, record: &Record) -> Result<()>;

    fn get_record(&self, entity: EntityKind, id: &RecordId) -> Result<Option<Record>>;

    /// Returns every record of the collection in insertion order.
    fn all_records(&self, entity: EntityKind) -> Result<Vec<Record>>;

    /// Deletes a record, returning whether it existed.
    fn delete_record(&mut self, entity: EntityKind, id: &RecordId) -> Result<bool>;

    fn clear_records(&mut self, entity: EntityKind) -> Result<()>;

    fn count_records(&self, entity: EntityKind) -> Result<usize>;
}
