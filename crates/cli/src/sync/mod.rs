// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Offline-first sync of local writes to the remote API.
//!
//! Writes are applied to local storage immediately and mirrored as queued
//! requests. The engine replays the queue whenever connectivity returns.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Engine    │────►│  Endpoint   │────►│   Remote    │
//! │(SyncEngine) │◄────│   (trait)   │◄────│     API     │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!    │      ▲
//!    ▼      │ online/offline
//! ┌───────┐ ┌──────────────┐      ┌─────────────┐
//! │Queues │ │ Connectivity │      │   Events    │  (status, notices)
//! └───────┘ └──────────────┘      └─────────────┘
//! ```
//!
//! # Features
//!
//! - Durable pending and failed queues in the local database
//! - Temporary ids swapped for server ids when creations replay
//! - Lost-update detection on 404 responses
//! - Drain on every offline-to-online transition
//! - Injectable endpoint trait for testing

mod connectivity;
mod engine;
mod events;
mod queue;
mod reconcile;
mod remote;

pub use connectivity::{probe_loop, ConnectivityMonitor};
pub use engine::{DrainSummary, SyncEngine};
pub use events::{Notice, NoticeLevel, QueueStatus, SyncEvents};
pub(crate) use queue::{find_failed_create, find_pending_create};
pub use remote::{HttpEndpoint, RemoteEndpoint, RemoteError, RemoteResult};

#[cfg(test)]
pub(crate) mod test_helpers;


#[cfg(test)]
mod engine_tests;
