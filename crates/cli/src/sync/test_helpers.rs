// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for sync module tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tally_core::{
    Database, EntityKind, Error, FailedRequest, LocalStore, Method, QueuedRequest, Record,
    RecordId, Result,
};

use super::remote::{RemoteEndpoint, RemoteError, RemoteResult};

/// A call observed by [`MockEndpoint`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: Option<Method>,
    pub url: String,
    pub body: Value,
}

#[derive(Default)]
struct MockState {
    responses: HashMap<(Option<Method>, String), VecDeque<RemoteResult<Value>>>,
    calls: Vec<Call>,
    reachable: bool,
    delays: HashMap<String, Duration>,
}

/// Scripted endpoint for testing without a server.
///
/// Responses are queued per method and URL and consumed in order. A request
/// with nothing scripted fails as a network error. Fetches are keyed with
/// method `None`.
#[derive(Clone, Default)]
pub struct MockEndpoint {
    state: Arc<Mutex<MockState>>,
}

impl MockEndpoint {
    pub fn new() -> Self {
        MockEndpoint::default()
    }

    /// Queue the response for the next `method` request to `url`.
    pub fn respond(&self, method: Method, url: &str, response: RemoteResult<Value>) {
        self.push(Some(method), url, response);
    }

    /// Queue the response for the next fetch of `url`.
    pub fn respond_fetch(&self, url: &str, response: RemoteResult<Value>) {
        self.push(None, url, response);
    }

    fn push(&self, method: Option<Method>, url: &str, response: RemoteResult<Value>) {
        self.state
            .lock()
            .unwrap()
            .responses
            .entry((method, url.to_string()))
            .or_default()
            .push_back(response);
    }

    /// Hold every request to `url` for `delay` before answering.
    pub fn delay(&self, url: &str, delay: Duration) {
        self.state.lock().unwrap().delays.insert(url.to_string(), delay);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().unwrap().reachable = reachable;
    }

    /// Every request and fetch received, in arrival order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn answer(
        &self,
        method: Option<Method>,
        url: String,
        body: Value,
    ) -> Pin<Box<dyn Future<Output = RemoteResult<Value>> + Send + '_>> {
        let (response, delay) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call {
                method,
                url: url.clone(),
                body,
            });
            let response = state
                .responses
                .get_mut(&(method, url.clone()))
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Err(RemoteError::network("no scripted response")));
            (response, state.delays.get(&url).copied())
        };
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            response
        })
    }
}

impl RemoteEndpoint for MockEndpoint {
    fn request(
        &self,
        method: Method,
        url: &str,
        body: &Value,
    ) -> Pin<Box<dyn Future<Output = RemoteResult<Value>> + Send + '_>> {
        self.answer(Some(method), url.to_string(), body.clone())
    }

    fn fetch(&self, url: &str) -> Pin<Box<dyn Future<Output = RemoteResult<Value>> + Send + '_>> {
        self.answer(None, url.to_string(), Value::Null)
    }

    fn probe(&self, _url: &str) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let reachable = self.state.lock().unwrap().reachable;
        Box::pin(async move { reachable })
    }
}

/// Names of store operations that should fail. Shared with the store.
#[derive(Clone, Default)]
pub struct Faults {
    failing: Arc<Mutex<HashSet<&'static str>>>,
}

impl Faults {
    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn heal(&self, operation: &'static str) {
        self.failing.lock().unwrap().remove(operation);
    }

    fn check(&self, operation: &'static str) -> Result<()> {
        if self.failing.lock().unwrap().contains(operation) {
            return Err(Error::Io(std::io::Error::other(format!("injected fault: {operation}"))));
        }
        Ok(())
    }
}

/// In-memory database with injectable per-operation failures.
pub struct FaultyStore {
    inner: Database,
    faults: Faults,
}

impl FaultyStore {
    pub fn new() -> (Self, Faults) {
        let faults = Faults::default();
        let store = FaultyStore {
            inner: Database::open_in_memory().unwrap(),
            faults: faults.clone(),
        };
        (store, faults)
    }
}

impl LocalStore for FaultyStore {
    fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.inner.rollback()
    }

    fn add_pending(&mut self, request: &QueuedRequest) -> Result<i64> {
        self.faults.check("add_pending")?;
        self.inner.add_pending(request)
    }

    fn update_pending(&mut self, request: &QueuedRequest) -> Result<()> {
        self.faults.check("update_pending")?;
        self.inner.update_pending(request)
    }

    fn get_pending(&self, id: i64) -> Result<Option<QueuedRequest>> {
        self.inner.get_pending(id)
    }

    fn all_pending(&self) -> Result<Vec<QueuedRequest>> {
        self.faults.check("all_pending")?;
        self.inner.all_pending()
    }

    fn delete_pending(&mut self, id: i64) -> Result<()> {
        self.faults.check("delete_pending")?;
        self.inner.delete_pending(id)
    }

    fn clear_pending(&mut self) -> Result<()> {
        self.inner.clear_pending()
    }

    fn count_pending(&self) -> Result<usize> {
        self.inner.count_pending()
    }

    fn add_failed(&mut self, request: &FailedRequest) -> Result<i64> {
        self.faults.check("add_failed")?;
        self.inner.add_failed(request)
    }

    fn get_failed(&self, id: i64) -> Result<Option<FailedRequest>> {
        self.inner.get_failed(id)
    }

    fn all_failed(&self) -> Result<Vec<FailedRequest>> {
        self.inner.all_failed()
    }

    fn delete_failed(&mut self, id: i64) -> Result<()> {
        self.faults.check("delete_failed")?;
        self.inner.delete_failed(id)
    }

    fn clear_failed(&mut self) -> Result<()> {
        self.inner.clear_failed()
    }

    fn count_failed(&self) -> Result<usize> {
        self.inner.count_failed()
    }

    fn add_record(&mut self, entity: EntityKind, record: &Record) -> Result<()> {
        self.faults.check("add_record")?;
        self.inner.add_record(entity, record)
    }

    fn update_record(&mut self, entity: EntityKind, record: &Record) -> Result<()> {
        self.faults.check("update_record")?;
        self.inner.update_record(entity, record)
    }

    fn get_record(&self, entity: EntityKind, id: &RecordId) -> Result<Option<Record>> {
        self.inner.get_record(entity, id)
    }

    fn all_records(&self, entity: EntityKind) -> Result<Vec<Record>> {
        self.inner.all_records(entity)
    }

    fn delete_record(&mut self, entity: EntityKind, id: &RecordId) -> Result<bool> {
        self.faults.check("delete_record")?;
        self.inner.delete_record(entity, id)
    }

    fn clear_records(&mut self, entity: EntityKind) -> Result<()> {
        self.inner.clear_records(entity)
    }

    fn count_records(&self, entity: EntityKind) -> Result<usize> {
        self.inner.count_records(entity)
    }
}
