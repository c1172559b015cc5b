// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the sync engine.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::connectivity::ConnectivityMonitor;
use super::engine::{group_by_target, DrainSummary, SyncEngine};
use super::events::NoticeLevel;
use super::remote::RemoteError;
use super::test_helpers::{Faults, FaultyStore, MockEndpoint};
use crate::error::Error;
use chrono::DateTime;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tally_core::{
    Database, EntityKind, FixedClock, LocalStore, Method, QueuedRequest, Record, RecordId, TempId,
};
use tokio::sync::broadcast::error::TryRecvError;
use tokio_util::sync::CancellationToken;

const NOW_MS: u64 = 1_767_225_600_000;
const PRODUCTS: &str = "http://api.test/products";

type TestEngine = SyncEngine<Database, MockEndpoint, FixedClock>;

fn engine() -> (TestEngine, MockEndpoint) {
    let remote = MockEndpoint::new();
    let engine = SyncEngine::with_clock(
        Database::open_in_memory().unwrap(),
        remote.clone(),
        ConnectivityMonitor::new(false),
        FixedClock(NOW_MS),
    );
    (engine, remote)
}

fn faulty_engine() -> (SyncEngine<FaultyStore, MockEndpoint, FixedClock>, MockEndpoint, Faults) {
    let remote = MockEndpoint::new();
    let (store, faults) = FaultyStore::new();
    let engine = SyncEngine::with_clock(
        store,
        remote.clone(),
        ConnectivityMonitor::new(false),
        FixedClock(NOW_MS),
    );
    (engine, remote, faults)
}

fn product_url(id: &str) -> String {
    format!("{PRODUCTS}/{id}")
}

fn seed_record<S: LocalStore, C: tally_core::ClockSource>(
    engine: &SyncEngine<S, MockEndpoint, C>,
    entity: EntityKind,
    id: RecordId,
    body: Value,
) {
    engine
        .queues()
        .with_store("seed", |s| s.add_record(entity, &Record::new(id, body)))
        .unwrap();
}

fn local_record<S: LocalStore, C: tally_core::ClockSource>(
    engine: &SyncEngine<S, MockEndpoint, C>,
    entity: EntityKind,
    id: &RecordId,
) -> Option<Record> {
    engine
        .queues()
        .with_store("read", |s| s.get_record(entity, id))
        .unwrap()
}

fn update(method: Method, id: &str) -> QueuedRequest {
    QueuedRequest::new(method, product_url(id), json!({"name": "renamed"}))
        .with_target(EntityKind::Product, RecordId::Permanent(id.to_string()))
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// Queueing

#[tokio::test]
async fn add_to_queue_persists_without_contacting_remote() {
    let (engine, remote) = engine();

    engine.add_to_queue(update(Method::Put, "1")).unwrap();
    engine.add_to_queue(update(Method::Patch, "2")).unwrap();

    assert_eq!(engine.pending_count().unwrap(), 2);
    assert!(remote.calls().is_empty());
    assert_eq!(engine.events().status().pending_count(), 2);
}

#[tokio::test]
async fn drain_of_empty_queue_makes_no_calls() {
    let (engine, remote) = engine();

    let summary = engine.process_queue().await;

    assert_eq!(summary, DrainSummary::default());
    assert!(remote.calls().is_empty());
}

// Success path

#[tokio::test]
async fn successful_replay_dequeues_and_notifies() {
    let (engine, remote) = engine();
    let mut notices = engine.events().subscribe_notices();
    engine.add_to_queue(update(Method::Put, "1")).unwrap();
    remote.respond(Method::Put, &product_url("1"), Ok(json!({"id": 1})));

    let summary = engine.process_queue().await;

    assert_eq!(summary.synced, 1);
    assert_eq!(engine.pending_count().unwrap(), 0);
    let call = &remote.calls()[0];
    assert_eq!(call.method, Some(Method::Put));
    assert_eq!(call.body, json!({"name": "renamed"}));
    assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Success);
}

#[tokio::test]
async fn create_replaces_temporary_record_with_server_record() {
    let (engine, remote) = engine();
    let temp = TempId(NOW_MS);
    seed_record(&engine, EntityKind::Product, temp.into(), json!({"name": "Widget"}));
    engine
        .add_to_queue(QueuedRequest::create(
            EntityKind::Product,
            PRODUCTS,
            temp,
            json!({"name": "Widget"}),
        ))
        .unwrap();
    remote.respond(Method::Post, PRODUCTS, Ok(json!({"id": 42, "name": "Widget"})));

    engine.process_queue().await;

    assert!(local_record(&engine, EntityKind::Product, &temp.into()).is_none());
    let permanent = local_record(&engine, EntityKind::Product, &RecordId::Permanent("42".into()));
    assert_eq!(permanent.unwrap().body["name"], "Widget");
    assert_eq!(engine.pending_count().unwrap(), 0);
    assert_eq!(remote.calls()[0].body["tempId"], "tmp-1767225600000");
}

#[tokio::test]
async fn untagged_create_reconciles_through_payload_marker() {
    let (engine, remote) = engine();
    seed_record(&engine, EntityKind::Customer, TempId(5).into(), json!({"name": "Ada"}));
    engine
        .add_to_queue(QueuedRequest::new(
            Method::Post,
            "http://api.test/customers",
            json!({"name": "Ada", "tempId": "tmp-5"}),
        ))
        .unwrap();
    remote.respond(
        Method::Post,
        "http://api.test/customers",
        Ok(json!({"id": "c-9", "name": "Ada"})),
    );

    engine.process_queue().await;

    assert!(local_record(&engine, EntityKind::Customer, &TempId(5).into()).is_none());
    let permanent = RecordId::Permanent("c-9".into());
    assert!(local_record(&engine, EntityKind::Customer, &permanent).is_some());
}

#[tokio::test]
async fn create_for_deleted_temporary_record_does_not_resurrect_it() {
    let (engine, remote) = engine();
    let temp = TempId(7);
    engine
        .add_to_queue(QueuedRequest::create(EntityKind::Product, PRODUCTS, temp, json!({})))
        .unwrap();
    remote.respond(Method::Post, PRODUCTS, Ok(json!({"id": 3})));

    let summary = engine.process_queue().await;

    assert_eq!(summary.synced, 1);
    assert!(local_record(&engine, EntityKind::Product, &RecordId::Permanent("3".into())).is_none());
    assert_eq!(engine.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn create_response_without_id_keeps_temporary_record_and_dequeues() {
    let (engine, remote) = engine();
    let temp = TempId(8);
    seed_record(&engine, EntityKind::Product, temp.into(), json!({"name": "x"}));
    engine
        .add_to_queue(QueuedRequest::create(
            EntityKind::Product,
            PRODUCTS,
            temp,
            json!({"name": "x"}),
        ))
        .unwrap();
    remote.respond(Method::Post, PRODUCTS, Ok(Value::Null));

    engine.process_queue().await;

    assert!(local_record(&engine, EntityKind::Product, &temp.into()).is_some());
    assert_eq!(engine.pending_count().unwrap(), 0);
}

// 404 handling

#[tokio::test]
async fn update_of_remotely_deleted_record_drops_local_copy() {
    for method in [Method::Put, Method::Patch] {
        let (engine, remote) = engine();
        let mut notices = engine.events().subscribe_notices();
        let id = RecordId::Permanent("1".into());
        seed_record(&engine, EntityKind::Product, id.clone(), json!({"name": "old"}));
        engine.add_to_queue(update(method, "1")).unwrap();
        remote.respond(method, &product_url("1"), Err(RemoteError::http(404, "Not Found")));

        let summary = engine.process_queue().await;

        assert_eq!(summary.conflicts, 1, "{method}");
        assert!(local_record(&engine, EntityKind::Product, &id).is_none(), "{method}");
        assert_eq!(engine.pending_count().unwrap(), 0);
        assert_eq!(engine.failed_count().unwrap(), 0);
        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Conflict);
        assert!(notice.message.contains("product 1"));
    }
}

#[tokio::test]
async fn untagged_update_conflict_finds_record_from_url() {
    let (engine, remote) = engine();
    let id = RecordId::Permanent("31".into());
    seed_record(&engine, EntityKind::Product, id.clone(), json!({}));
    engine
        .add_to_queue(QueuedRequest::new(Method::Patch, product_url("31"), json!({"qty": 2})))
        .unwrap();
    remote.respond(Method::Patch, &product_url("31"), Err(RemoteError::http(404, "")));

    engine.process_queue().await;

    assert!(local_record(&engine, EntityKind::Product, &id).is_none());
}

#[tokio::test]
async fn delete_of_missing_record_succeeds_silently() {
    let (engine, remote) = engine();
    let mut notices = engine.events().subscribe_notices();
    engine
        .add_to_queue(
            QueuedRequest::new(Method::Delete, product_url("4"), Value::Null)
                .with_target(EntityKind::Product, RecordId::Permanent("4".into())),
        )
        .unwrap();
    remote.respond(Method::Delete, &product_url("4"), Err(RemoteError::http(404, "")));

    let summary = engine.process_queue().await;

    assert_eq!(summary.synced, 1);
    assert_eq!(engine.pending_count().unwrap(), 0);
    assert_eq!(engine.failed_count().unwrap(), 0);
    assert!(matches!(notices.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn create_404_is_quarantined() {
    let (engine, remote) = engine();
    engine
        .add_to_queue(QueuedRequest::create(EntityKind::Product, PRODUCTS, TempId(1), json!({})))
        .unwrap();
    remote.respond(Method::Post, PRODUCTS, Err(RemoteError::http(404, "no route")));

    let summary = engine.process_queue().await;

    assert_eq!(summary.failed, 1);
    assert_eq!(engine.failed_requests().unwrap()[0].error, "HTTP 404: no route");
}

// Failures

#[tokio::test]
async fn server_error_moves_request_to_failed_queue() {
    let (engine, remote) = engine();
    let mut notices = engine.events().subscribe_notices();
    engine.add_to_queue(update(Method::Put, "1")).unwrap();
    remote.respond(Method::Put, &product_url("1"), Err(RemoteError::http(500, "boom")));

    let summary = engine.process_queue().await;

    assert_eq!(summary.failed, 1);
    assert_eq!(engine.pending_count().unwrap(), 0);
    let failed = engine.failed_requests().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error, "HTTP 500: boom");
    assert_eq!(failed[0].url, product_url("1"));
    assert_eq!(failed[0].payload, json!({"name": "renamed"}));
    let expected = DateTime::from_timestamp_millis(NOW_MS as i64).unwrap();
    assert_eq!(failed[0].timestamp, expected);
    assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Error);
}

#[tokio::test]
async fn network_error_moves_request_to_failed_queue() {
    let (engine, _remote) = engine();
    engine.add_to_queue(update(Method::Patch, "1")).unwrap();

    let summary = engine.process_queue().await;

    assert_eq!(summary.failed, 1);
    assert!(engine.failed_requests().unwrap()[0].error.starts_with("network error"));
}

#[tokio::test]
async fn failed_queue_write_failure_keeps_request_pending() {
    let (engine, remote, faults) = faulty_engine();
    engine.add_to_queue(update(Method::Put, "1")).unwrap();
    remote.respond(Method::Put, &product_url("1"), Err(RemoteError::http(500, "boom")));
    faults.fail("add_failed");

    let summary = engine.process_queue().await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(engine.pending_count().unwrap(), 1);
    assert_eq!(engine.failed_count().unwrap(), 0);
}

#[tokio::test]
async fn dequeue_failure_leaves_request_for_next_drain() {
    let (engine, remote, faults) = faulty_engine();
    engine.add_to_queue(update(Method::Put, "1")).unwrap();
    remote.respond(Method::Put, &product_url("1"), Ok(json!({})));
    remote.respond(Method::Put, &product_url("1"), Ok(json!({})));
    faults.fail("delete_pending");

    let first = engine.process_queue().await;
    faults.heal("delete_pending");
    let second = engine.process_queue().await;

    assert_eq!(first.skipped, 1);
    assert_eq!(second.synced, 1);
    assert_eq!(engine.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn reconcile_storage_failure_leaves_create_pending() {
    let (engine, remote, faults) = faulty_engine();
    let temp = TempId(11);
    seed_record(&engine, EntityKind::Product, temp.into(), json!({"name": "Widget"}));
    engine
        .add_to_queue(QueuedRequest::create(EntityKind::Product, PRODUCTS, temp, json!({})))
        .unwrap();
    remote.respond(Method::Post, PRODUCTS, Ok(json!({"id": 12})));
    faults.fail("add_record");

    let summary = engine.process_queue().await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(engine.pending_count().unwrap(), 1);
    let kept = local_record(&engine, EntityKind::Product, &temp.into()).unwrap();
    assert_eq!(kept.body["name"], "Widget");
    let permanent = RecordId::Permanent("12".into());
    assert!(local_record(&engine, EntityKind::Product, &permanent).is_none());
}

#[tokio::test]
async fn lost_update_keeps_local_record_when_dequeue_fails() {
    let (engine, remote, faults) = faulty_engine();
    let permanent = RecordId::Permanent("1".into());
    seed_record(&engine, EntityKind::Product, permanent.clone(), json!({"id": 1}));
    engine.add_to_queue(update(Method::Put, "1")).unwrap();
    remote.respond(Method::Put, &product_url("1"), Err(RemoteError::http(404, "gone")));
    faults.fail("delete_pending");

    let summary = engine.process_queue().await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(engine.pending_count().unwrap(), 1);
    assert!(local_record(&engine, EntityKind::Product, &permanent).is_some());
}

#[tokio::test]
async fn failure_of_create_withdrawn_in_flight_is_not_quarantined() {
    let (engine, remote) = engine();
    let temp = TempId(11);
    seed_record(&engine, EntityKind::Product, temp.into(), json!({"name": "Widget"}));
    let id = engine
        .add_to_queue(QueuedRequest::create(EntityKind::Product, PRODUCTS, temp, json!({})))
        .unwrap();
    remote.respond(Method::Post, PRODUCTS, Err(RemoteError::http(500, "boom")));
    remote.delay(PRODUCTS, Duration::from_millis(100));

    let (summary, ()) = tokio::join!(engine.process_queue(), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.queues().dequeue(id).unwrap();
    });

    assert_eq!(summary.skipped, 1);
    assert_eq!(engine.pending_count().unwrap(), 0);
    assert_eq!(engine.failed_count().unwrap(), 0);
}

#[tokio::test]
async fn unreadable_queue_yields_empty_drain() {
    let (engine, remote, faults) = faulty_engine();
    engine.add_to_queue(update(Method::Put, "1")).unwrap();
    faults.fail("all_pending");

    let summary = engine.process_queue().await;

    assert_eq!(summary.attempted(), 0);
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn one_failure_does_not_stop_other_entries() {
    let (engine, remote) = engine();
    engine.add_to_queue(update(Method::Put, "1")).unwrap();
    engine.add_to_queue(update(Method::Put, "2")).unwrap();
    remote.respond(Method::Put, &product_url("1"), Err(RemoteError::http(500, "boom")));
    remote.respond(Method::Put, &product_url("2"), Ok(json!({})));

    let summary = engine.process_queue().await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.synced, 1);
    assert_eq!(summary.attempted(), 2);
}

// Ordering

#[tokio::test]
async fn same_record_replays_in_order_while_others_run_concurrently() {
    let (engine, remote) = engine();
    remote.delay(&product_url("1"), Duration::from_millis(50));
    engine.add_to_queue(update(Method::Put, "1")).unwrap();
    engine.add_to_queue(update(Method::Patch, "1")).unwrap();
    engine.add_to_queue(update(Method::Put, "2")).unwrap();
    for (method, id) in [(Method::Put, "1"), (Method::Patch, "1"), (Method::Put, "2")] {
        remote.respond(method, &product_url(id), Ok(json!({})));
    }

    let summary = engine.process_queue().await;

    assert_eq!(summary.synced, 3);
    let order: Vec<_> = remote
        .calls()
        .into_iter()
        .map(|c| (c.method.unwrap(), c.url))
        .collect();
    assert_eq!(
        order,
        [
            (Method::Put, product_url("1")),
            (Method::Put, product_url("2")),
            (Method::Patch, product_url("1")),
        ]
    );
}

#[test]
fn grouping_keeps_queue_order_and_isolates_untargeted_entries() {
    let mut requests = vec![
        update(Method::Put, "1"),
        update(Method::Put, "2"),
        QueuedRequest::new(Method::Post, "http://elsewhere.test/x", json!({})),
        update(Method::Patch, "1"),
        QueuedRequest::new(Method::Post, "http://elsewhere.test/y", json!({})),
    ];
    for (i, request) in requests.iter_mut().enumerate() {
        request.id = Some(i as i64 + 1);
    }

    let groups = group_by_target(requests);

    let ids: Vec<Vec<i64>> = groups
        .iter()
        .map(|g| g.iter().map(|r| r.id.unwrap()).collect())
        .collect();
    assert_eq!(ids, vec![vec![1, 4], vec![2], vec![3], vec![5]]);
}

// Failed queue management

async fn engine_with_failures(n: usize) -> (TestEngine, MockEndpoint) {
    let (engine, remote) = engine();
    for i in 0..n {
        engine.add_to_queue(update(Method::Put, &i.to_string())).unwrap();
    }
    engine.process_queue().await;
    assert_eq!(engine.failed_count().unwrap(), n);
    (engine, remote)
}

#[tokio::test]
async fn retry_moves_failed_request_to_end_of_pending() {
    let (engine, _remote) = engine_with_failures(1).await;
    engine.add_to_queue(update(Method::Put, "9")).unwrap();
    let failed = engine.failed_requests().unwrap().remove(0);

    engine.retry_failed_request(&failed).unwrap();

    assert_eq!(engine.failed_count().unwrap(), 0);
    let pending = engine.pending_requests().unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[1].url, product_url("0"));
    assert_eq!(pending[1].payload, failed.payload);
    assert_eq!(pending[1].target, failed.target);
}

#[tokio::test]
async fn retried_request_leaves_both_queues_after_successful_drain() {
    let (engine, remote) = engine_with_failures(1).await;
    let failed = engine.failed_requests().unwrap().remove(0);
    engine.retry_failed_request(&failed).unwrap();
    remote.respond(Method::Put, &product_url("0"), Ok(json!({"id": 0})));

    let summary = engine.process_queue().await;

    assert_eq!(summary.synced, 1);
    assert_eq!(engine.pending_count().unwrap(), 0);
    assert_eq!(engine.failed_count().unwrap(), 0);
    let puts = remote.calls().into_iter().filter(|c| c.method == Some(Method::Put)).count();
    assert_eq!(puts, 2);
}

#[tokio::test]
async fn retry_all_requeues_everything() {
    let (engine, _remote) = engine_with_failures(3).await;

    let moved = engine.retry_all_failed_requests().unwrap();

    assert_eq!(moved, 3);
    assert_eq!(engine.failed_count().unwrap(), 0);
    let urls: Vec<_> = engine.pending_requests().unwrap().into_iter().map(|r| r.url).collect();
    assert_eq!(urls, [product_url("0"), product_url("1"), product_url("2")]);
    assert_eq!(engine.events().status().pending_count(), 3);
}

#[tokio::test]
async fn retry_all_with_nothing_failed_is_a_no_op() {
    let (engine, _remote) = engine();

    assert_eq!(engine.retry_all_failed_requests().unwrap(), 0);
    assert_eq!(engine.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn delete_failed_request_removes_only_that_entry() {
    let (engine, _remote) = engine_with_failures(2).await;
    let first = engine.failed_requests().unwrap()[0].id.unwrap();

    engine.delete_failed_request(first).unwrap();

    let remaining = engine.failed_requests().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].url, product_url("1"));
    assert_eq!(engine.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn unknown_failed_request_is_reported() {
    let (engine, _remote) = engine();

    let err = engine.failed_request(99).unwrap_err();

    assert!(matches!(err, Error::FailedRequestNotFound(99)));
}

#[tokio::test]
async fn status_stream_reflects_drain_results() {
    let (engine, remote) = engine();
    let mut status = engine.events().watch_status();
    engine.add_to_queue(update(Method::Put, "1")).unwrap();
    engine.add_to_queue(update(Method::Put, "2")).unwrap();
    remote.respond(Method::Put, &product_url("1"), Ok(json!({})));

    engine.process_queue().await;

    let snapshot = status.borrow_and_update().clone();
    assert_eq!(snapshot.pending_count(), 0);
    assert_eq!(snapshot.failed_count(), 1);
}

// Connectivity

#[tokio::test]
async fn run_drains_at_start_when_online() {
    let (engine, remote) = engine();
    engine.add_to_queue(update(Method::Put, "1")).unwrap();
    remote.respond(Method::Put, &product_url("1"), Ok(json!({})));
    engine.connectivity().set_online(true);
    let engine = Arc::new(engine);
    let cancel = CancellationToken::new();

    let task = tokio::spawn({
        let engine = Arc::clone(&engine);
        let cancel = cancel.clone();
        async move { engine.run(cancel).await }
    });

    wait_until(|| engine.pending_count().unwrap() == 0).await;
    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn run_drains_once_per_return_to_online() {
    let (engine, remote) = engine();
    let engine = Arc::new(engine);
    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let engine = Arc::clone(&engine);
        let cancel = cancel.clone();
        async move { engine.run(cancel).await }
    });

    // Offline: queued writes stay put.
    engine.add_to_queue(update(Method::Put, "1")).unwrap();
    remote.respond(Method::Put, &product_url("1"), Ok(json!({})));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(remote.calls().is_empty());

    engine.connectivity().set_online(true);
    wait_until(|| engine.pending_count().unwrap() == 0).await;
    assert_eq!(remote.calls().len(), 1);

    // Still online: reporting online again is not a transition.
    engine.add_to_queue(update(Method::Put, "2")).unwrap();
    remote.respond(Method::Put, &product_url("2"), Ok(json!({})));
    engine.connectivity().set_online(true);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(engine.pending_count().unwrap(), 1);

    engine.connectivity().set_online(false);
    engine.connectivity().set_online(true);
    wait_until(|| engine.pending_count().unwrap() == 0).await;
    assert_eq!(remote.calls().len(), 2);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn temp_ids_are_unique_under_a_frozen_clock() {
    let (engine, _remote) = engine();

    let first = engine.next_temp_id();
    let second = engine.next_temp_id();

    assert_eq!(first, TempId(NOW_MS));
    assert_eq!(second, TempId(NOW_MS + 1));
}
