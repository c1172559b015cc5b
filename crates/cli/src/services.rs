// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Offline-first CRUD over one entity collection.
//!
//! Every write lands in local storage first and is then mirrored as a
//! queued request. Reads only ever touch local storage, except
//! [`EntityService::refresh`], which pulls the collection from the server.

use std::collections::HashSet;

use serde_json::Value;
use tally_core::{
    merge_fields, with_temp_marker, ClockSource, EntityKind, LocalStore, Method, QueuedRequest,
    Record, RecordId, SystemClock, TempId,
};

use crate::error::{Error, Result};
use crate::sync::{find_failed_create, find_pending_create, RemoteEndpoint, SyncEngine};

/// Data service for a single entity kind.
pub struct EntityService<'a, S, R, C: ClockSource = SystemClock> {
    engine: &'a SyncEngine<S, R, C>,
    entity: EntityKind,
    collection_url: String,
}

impl<'a, S: LocalStore, R: RemoteEndpoint, C: ClockSource> EntityService<'a, S, R, C> {
    pub fn new(engine: &'a SyncEngine<S, R, C>, entity: EntityKind, api_url: &str) -> Self {
        EntityService {
            engine,
            entity,
            collection_url: format!("{}/{}", api_url.trim_end_matches('/'), entity.collection()),
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    fn record_url(&self, id: &RecordId) -> String {
        format!("{}/{}", self.collection_url, id)
    }

    fn store<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut S) -> tally_core::Result<T>,
    ) -> Result<T> {
        Ok(self.engine.queues().with_store(operation, f)?)
    }

    /// Load a record or fail with `RecordNotFound`.
    fn require(&self, id: &RecordId) -> Result<Record> {
        self.get(id)?.ok_or_else(|| {
            tally_core::Error::RecordNotFound {
                collection: self.entity.collection().to_string(),
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Run a local write and the queueing of its request as one transaction.
    fn write<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut S) -> tally_core::Result<T>,
    ) -> Result<T> {
        let value = self.store(operation, |s| s.transaction(f))?;
        self.engine.publish_status();
        Ok(value)
    }

    /// Create a record under a temporary id and queue its `POST`.
    pub fn create(&self, body: Value) -> Result<Record> {
        require_object(&body)?;
        let temp = self.engine.next_temp_id();
        let record = Record::new(temp.into(), body.clone());
        let request = QueuedRequest::create(self.entity, &self.collection_url, temp, body);

        let entity = self.entity;
        self.write("create record", |s| {
            s.add_record(entity, &record)?;
            s.add_pending(&request)
        })?;
        tracing::debug!(%entity, %temp, "created record offline");
        Ok(record)
    }

    /// Replace a record's body and queue a `PUT`.
    ///
    /// A temporary record is not known to the server yet, so its pending
    /// `POST` is rewritten instead. If that `POST` is in flight, the engine
    /// turns the rewrite into a `PUT` once the server confirms the creation.
    pub fn update(&self, id: &RecordId, body: Value) -> Result<Record> {
        require_object(&body)?;
        self.require(id)?;
        let record = Record::new(id.clone(), body);
        let entity = self.entity;

        if let Some(temp) = id.temp_id() {
            let rewritten = self.write("update record", |s| {
                let Some(mut create) = find_pending_create(s, entity, temp)? else {
                    return Ok(false);
                };
                s.update_record(entity, &record)?;
                create.payload = with_temp_marker(record.body.clone(), temp);
                s.update_pending(&create)?;
                Ok(true)
            })?;
            return confirmed(rewritten, temp).map(|()| record);
        }

        let request = QueuedRequest::new(Method::Put, self.record_url(id), record.body.clone())
            .with_target(entity, id.clone());
        self.write("update record", |s| {
            s.update_record(entity, &record)?;
            s.add_pending(&request)
        })?;
        Ok(record)
    }

    /// Merge `fields` into a record and queue a `PATCH` carrying only them.
    pub fn patch(&self, id: &RecordId, fields: Value) -> Result<Record> {
        require_object(&fields)?;
        let mut record = self.require(id)?;
        merge_fields(&mut record.body, &fields);
        let entity = self.entity;

        if let Some(temp) = id.temp_id() {
            let rewritten = self.write("patch record", |s| {
                let Some(mut create) = find_pending_create(s, entity, temp)? else {
                    return Ok(false);
                };
                s.update_record(entity, &record)?;
                merge_fields(&mut create.payload, &fields);
                s.update_pending(&create)?;
                Ok(true)
            })?;
            return confirmed(rewritten, temp).map(|()| record);
        }

        let request = QueuedRequest::new(Method::Patch, self.record_url(id), fields)
            .with_target(entity, id.clone());
        self.write("patch record", |s| {
            s.update_record(entity, &record)?;
            s.add_pending(&request)
        })?;
        Ok(record)
    }

    /// Delete a record locally and queue a `DELETE`.
    ///
    /// Deleting a temporary record cancels its creation instead. If the
    /// creation is already in flight, reconciliation finds the record gone
    /// and leaves it that way.
    pub fn delete(&self, id: &RecordId) -> Result<()> {
        self.require(id)?;
        let entity = self.entity;

        if let Some(temp) = id.temp_id() {
            return self.write("delete record", |s| {
                s.delete_record(entity, id)?;
                if let Some(pending_id) = find_pending_create(s, entity, temp)?.and_then(|r| r.id) {
                    s.delete_pending(pending_id)?;
                }
                if let Some(failed_id) = find_failed_create(s, entity, temp)?.and_then(|r| r.id) {
                    s.delete_failed(failed_id)?;
                }
                Ok(())
            });
        }

        let request = QueuedRequest::new(Method::Delete, self.record_url(id), Value::Null)
            .with_target(entity, id.clone());
        self.write("delete record", |s| {
            s.delete_record(entity, id)?;
            s.add_pending(&request).map(drop)
        })
    }

    pub fn get(&self, id: &RecordId) -> Result<Option<Record>> {
        self.store("get record", |s| s.get_record(self.entity, id))
    }

    /// Every local record, in insertion order.
    pub fn list(&self) -> Result<Vec<Record>> {
        self.store("list records", |s| s.all_records(self.entity))
    }

    /// Replace the local collection with the server's.
    ///
    /// Records with unsynced local changes (temporary records, and records
    /// with a pending update or delete) keep their local state. Returns the
    /// number of records the server sent. The local collection is swapped in
    /// one transaction.
    pub async fn refresh(&self) -> Result<usize> {
        let response = self.engine.remote().fetch(&self.collection_url).await?;
        let items = match response {
            Value::Array(items) => items,
            other => {
                return Err(Error::UnexpectedResponse {
                    url: self.collection_url.clone(),
                    reason: format!("expected a JSON array, got {}", json_kind(&other)),
                })
            }
        };
        let received = items.len();

        let mut server_records = Vec::with_capacity(items.len());
        for item in items {
            match Record::from_server(item) {
                Ok(record) => server_records.push(record),
                Err(e) => {
                    tracing::warn!(entity = %self.entity, error = %e, "skipping server record")
                }
            }
        }

        let entity = self.entity;
        self.store("refresh records", |s| {
            s.transaction(|s| {
                let dirty: HashSet<RecordId> = s
                    .all_pending()?
                    .iter()
                    .filter_map(QueuedRequest::effective_target)
                    .filter(|target| target.entity == entity)
                    .map(|target| target.record)
                    .collect();
                let kept: Vec<Record> = s
                    .all_records(entity)?
                    .into_iter()
                    .filter(|r| r.id.is_temporary() || dirty.contains(&r.id))
                    .collect();

                s.clear_records(entity)?;
                for record in server_records.iter().filter(|r| !dirty.contains(&r.id)) {
                    if s.get_record(entity, &record.id)?.is_some() {
                        s.update_record(entity, record)?;
                    } else {
                        s.add_record(entity, record)?;
                    }
                }
                for record in &kept {
                    s.add_record(entity, record)?;
                }
                Ok(())
            })
        })?;

        tracing::info!(entity = %self.entity, received, "refreshed collection");
        Ok(received)
    }
}

/// A temporary record whose creation is no longer pending (it failed, or
/// the server already confirmed it) cannot be edited under its temporary id.
fn confirmed(rewritten: bool, temp: TempId) -> Result<()> {
    if rewritten {
        Ok(())
    } else {
        Err(Error::Unconfirmed {
            id: temp.to_string(),
        })
    }
}

fn require_object(body: &Value) -> Result<()> {
    if body.is_object() {
        Ok(())
    } else {
        Err(Error::InvalidBody {
            reason: format!("expected a JSON object, got {}", json_kind(body)),
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[path = "services_tests.rs"]
mod tests;
