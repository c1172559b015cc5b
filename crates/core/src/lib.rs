// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tally-core: shared data model for the tally offline sync client.
//!
//! This crate provides the queue records, record identity, entity kinds and
//! the SQLite-backed local store consumed by the sync engine.

pub mod clock;
pub mod db;
pub mod entity;
pub mod error;
pub mod method;
pub mod record;
pub mod request;
pub mod store;

pub use clock::{ClockSource, FixedClock, SystemClock};
pub use db::Database;
pub use entity::EntityKind;
pub use error::{Error, Result};
pub use method::Method;
pub use record::{merge_fields, Record, RecordId, TempId, TempIdGenerator};
pub use request::{
    with_temp_marker, without_temp_marker, FailedRequest, QueuedRequest, RequestTarget,
};
pub use store::LocalStore;
