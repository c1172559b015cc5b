// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Test infrastructure for command testing without filesystem setup.
//!
//! This module provides a `TestContext` that wraps an engine over an
//! in-memory database and a scripted endpoint, enabling commands to be
//! tested without a `.tally/` directory or a server.

use serde_json::Value;
use tally_core::{Database, EntityKind, FixedClock};

use crate::config::Config;
use crate::services::EntityService;
use crate::sync::test_helpers::MockEndpoint;
use crate::sync::{ConnectivityMonitor, SyncEngine};

pub const API: &str = "http://api.test";
pub const NOW_MS: u64 = 1_767_225_600_000;

pub type TestEngine = SyncEngine<Database, MockEndpoint, FixedClock>;

/// Test context providing an in-memory engine and default config.
pub struct TestContext {
    pub engine: TestEngine,
    pub remote: MockEndpoint,
    pub config: Config,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    pub fn new() -> Self {
        let remote = MockEndpoint::new();
        let engine = SyncEngine::with_clock(
            Database::open_in_memory().unwrap(),
            remote.clone(),
            ConnectivityMonitor::new(false),
            FixedClock(NOW_MS),
        );
        TestContext {
            engine,
            remote,
            config: Config::new(API).unwrap(),
        }
    }

    pub fn service(
        &self,
        entity: EntityKind,
    ) -> EntityService<'_, Database, MockEndpoint, FixedClock> {
        EntityService::new(&self.engine, entity, &self.config.api_url)
    }

    /// Create a record offline and return its id.
    pub fn create(&self, entity: EntityKind, body: Value) -> String {
        self.service(entity).create(body).unwrap().id.to_string()
    }
}
