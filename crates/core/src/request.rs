// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queued and failed remote mutations.
//!
//! A [`QueuedRequest`] is created together with the optimistic local write it
//! mirrors. It lives in the pending collection until the server confirms it,
//! the write becomes moot, or it is quarantined as a [`FailedRequest`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::EntityKind;
use crate::method::Method;
use crate::record::{RecordId, TempId, TEMP_ID_FIELD};

/// The local record a queued request writes to.
///
/// Attached at enqueue time so the engine never has to guess the collection
/// from the URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestTarget {
    pub entity: EntityKind,
    pub record: RecordId,
}

impl RequestTarget {
    pub fn new(entity: EntityKind, record: RecordId) -> Self {
        RequestTarget { entity, record }
    }
}

/// A remote mutation that has not been confirmed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequest {
    /// Store-assigned identifier; `None` until persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub url: String,
    pub method: Method,
    /// Replayed verbatim as the request body. May be `null`.
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<RequestTarget>,
}

impl QueuedRequest {
    /// Creates an untagged request.
    pub fn new(method: Method, url: impl Into<String>, payload: Value) -> Self {
        QueuedRequest {
            id: None,
            url: url.into(),
            method,
            payload,
            target: None,
        }
    }

    /// Tags the request with the local record it mirrors.
    pub fn with_target(mut self, entity: EntityKind, record: RecordId) -> Self {
        self.target = Some(RequestTarget::new(entity, record));
        self
    }

    /// Creates the `POST` that replays an offline creation.
    ///
    /// The payload carries the temporary id marker so the server response can
    /// be matched back to the placeholder record.
    pub fn create(
        entity: EntityKind,
        url: impl Into<String>,
        temp_id: TempId,
        body: Value,
    ) -> Self {
        let payload = with_temp_marker(body, temp_id);
        QueuedRequest::new(Method::Post, url, payload).with_target(entity, temp_id.into())
    }

    /// Returns the local record this request writes to.
    ///
    /// Uses the explicit target when present. Untagged entries fall back to
    /// the URL: the collection segment names the entity and, for updates and
    /// deletes, the following segment names the record. A creation falls back
    /// to the payload's temporary id marker.
    pub fn effective_target(&self) -> Option<RequestTarget> {
        if let Some(target) = &self.target {
            return Some(target.clone());
        }

        let entity = EntityKind::from_url(&self.url)?;
        let record = match self.method {
            Method::Post => RecordId::Temporary(self.payload_temp_id()?),
            _ => record_segment(&self.url, entity)?,
        };
        Some(RequestTarget::new(entity, record))
    }

    /// Returns the entity and temporary id a successful replay must reconcile.
    ///
    /// `None` for anything but a creation of a temporary record.
    pub fn reconcile_target(&self) -> Option<(EntityKind, TempId)> {
        if self.method != Method::Post {
            return None;
        }
        let target = self.effective_target()?;
        let temp = target.record.temp_id()?;
        Some((target.entity, temp))
    }

    /// Reads the temporary id marker from the payload, if any.
    pub fn payload_temp_id(&self) -> Option<TempId> {
        self.payload.get(TEMP_ID_FIELD).and_then(TempId::from_marker)
    }
}

/// Returns `body` with the temporary id marker set.
pub fn with_temp_marker(body: Value, temp_id: TempId) -> Value {
    match body {
        Value::Object(mut map) => {
            map.insert(TEMP_ID_FIELD.to_string(), temp_id.to_marker());
            Value::Object(map)
        }
        other => other,
    }
}

/// Returns `body` with the temporary id marker removed.
pub fn without_temp_marker(body: Value) -> Value {
    match body {
        Value::Object(mut map) => {
            map.remove(TEMP_ID_FIELD);
            Value::Object(map)
        }
        other => other,
    }
}

/// Extracts the record segment following the entity's collection in a URL.
fn record_segment(url: &str, entity: EntityKind) -> Option<RecordId> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    segments.find(|s| *s == entity.collection())?;
    segments.next().and_then(|s| s.parse().ok())
}

/// A queued request whose replay failed for a reason retrying cannot fix
/// automatically.
///
/// Only an explicit retry or dismissal removes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub url: String,
    pub method: Method,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<RequestTarget>,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl FailedRequest {
    /// Copies a pending request into quarantine with the failure attached.
    pub fn from_queued(
        request: &QueuedRequest,
        error: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        FailedRequest {
            id: None,
            url: request.url.clone(),
            method: request.method,
            payload: request.payload.clone(),
            target: request.target.clone(),
            error: error.into(),
            timestamp,
        }
    }

    /// Rebuilds the original request, without a store id, for re-queueing.
    pub fn to_queued(&self) -> QueuedRequest {
        QueuedRequest {
            id: None,
            url: self.url.clone(),
            method: self.method,
            payload: self.payload.clone(),
            target: self.target.clone(),
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
