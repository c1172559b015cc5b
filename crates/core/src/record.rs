// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Record identity and locally stored entity records.
//!
//! A record created while offline carries a [`TempId`] until the server
//! confirms it; from then on it carries the server-assigned permanent id.
//! The two are distinct variants of [`RecordId`], never distinguished by sign
//! or by format conventions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use crate::clock::{ClockSource, SystemClock};
use crate::error::{Error, Result};

/// Prefix used when a temporary id is rendered as text.
pub const TEMP_PREFIX: &str = "tmp-";

/// Payload field that marks a creation request with its temporary id.
pub const TEMP_ID_FIELD: &str = "tempId";

/// Locally assigned placeholder identity for a record created offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempId(pub u64);

impl TempId {
    /// Reads a temporary id from a payload marker.
    ///
    /// Accepts the textual form (`"tmp-1700000000000"`) as well as the
    /// negative-timestamp numbers older clients wrote.
    pub fn from_marker(value: &Value) -> Option<TempId> {
        match value {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n
                .as_i64()
                .filter(|v| *v < 0)
                .map(|v| TempId(v.unsigned_abs())),
            _ => None,
        }
    }

    /// Returns the payload marker for this id.
    pub fn to_marker(self) -> Value {
        Value::String(self.to_string())
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TEMP_PREFIX}{}", self.0)
    }
}

impl FromStr for TempId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.strip_prefix(TEMP_PREFIX)
            .and_then(|n| n.parse().ok())
            .map(TempId)
            .ok_or_else(|| Error::InvalidRecordId(s.to_string()))
    }
}

/// Issues temporary ids derived from the clock.
///
/// Ids are unique within the generator: two calls in the same millisecond
/// yield consecutive values rather than a collision.
pub struct TempIdGenerator<C: ClockSource = SystemClock> {
    clock: C,
    last: Mutex<u64>,
}

impl TempIdGenerator<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for TempIdGenerator<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ClockSource> TempIdGenerator<C> {
    /// Creates a generator over a custom clock source.
    pub fn with_clock(clock: C) -> Self {
        TempIdGenerator {
            clock,
            last: Mutex::new(0),
        }
    }

    /// Returns the next temporary id.
    pub fn next_id(&self) -> TempId {
        let now = self.clock.now_ms();
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = if now > *last { now } else { *last + 1 };
        *last = next;
        TempId(next)
    }
}

/// Identity of a locally stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RecordId {
    /// Assigned locally, not yet confirmed by the server.
    Temporary(TempId),
    /// Assigned by the server.
    Permanent(String),
}

impl RecordId {
    /// Builds a permanent id from a server JSON value.
    ///
    /// Servers assign either strings or integers; both are normalized to text.
    pub fn from_server_value(value: &Value) -> Option<RecordId> {
        match value {
            Value::String(s) if !s.is_empty() => Some(RecordId::Permanent(s.clone())),
            Value::Number(n) => Some(RecordId::Permanent(n.to_string())),
            _ => None,
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, RecordId::Temporary(_))
    }

    /// Returns the temporary id, if this record has not been reconciled.
    pub fn temp_id(&self) -> Option<TempId> {
        match self {
            RecordId::Temporary(t) => Some(*t),
            RecordId::Permanent(_) => None,
        }
    }

    /// Returns the JSON form used inside record bodies.
    pub fn to_json(&self) -> Value {
        match self {
            RecordId::Temporary(t) => Value::String(t.to_string()),
            RecordId::Permanent(id) => Value::String(id.clone()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Temporary(t) => write!(f, "{t}"),
            RecordId::Permanent(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for RecordId {
    type Err = Error;

    /// Parses user input: `tmp-<n>` is temporary, anything else permanent.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidRecordId(s.to_string()));
        }
        if s.starts_with(TEMP_PREFIX) {
            return s.parse().map(RecordId::Temporary);
        }
        Ok(RecordId::Permanent(s.to_string()))
    }
}

impl From<TempId> for RecordId {
    fn from(t: TempId) -> Self {
        RecordId::Temporary(t)
    }
}

/// A locally stored domain record (product, customer, sale, ...).
///
/// The body is opaque to the sync engine; only the identity matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub body: Value,
}

impl Record {
    pub fn new(id: RecordId, body: Value) -> Self {
        Record { id, body }
    }

    /// Builds a record from a server response body.
    ///
    /// The response must carry an `id` field holding the permanent id.
    pub fn from_server(body: Value) -> Result<Record> {
        let id = body
            .get("id")
            .and_then(RecordId::from_server_value)
            .ok_or_else(|| Error::InvalidInput("server record has no usable 'id' field".into()))?;
        Ok(Record { id, body })
    }

    /// Returns the body with its `id` field set to this record's identity.
    pub fn to_json(&self) -> Value {
        let mut object = match &self.body {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        };
        if self.id.is_temporary() || !object.contains_key("id") {
            object.insert("id".to_string(), self.id.to_json());
        }
        Value::Object(object)
    }
}

/// Merges the top-level fields of `patch` into `target`.
///
/// Non-object targets are replaced outright.
pub fn merge_fields(target: &mut Value, patch: &Value) {
    match (target.as_object_mut(), patch.as_object()) {
        (Some(dst), Some(src)) => {
            for (key, value) in src {
                dst.insert(key.clone(), value.clone());
            }
        }
        _ => *target = patch.clone(),
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
