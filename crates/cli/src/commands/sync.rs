// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queue replay commands: `sync`, `retry`, `dismiss` and `watch`.

use std::sync::Arc;
use std::time::Duration;

use tally_core::{ClockSource, LocalStore};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::sync::{probe_loop, DrainSummary, Notice, RemoteEndpoint, SyncEngine};

use super::{open_engine, probe, runtime, Engine};

/// Result of a manual sync.
#[derive(Debug)]
pub(crate) enum SyncOutcome {
    /// The API did not answer; nothing was replayed.
    Offline { pending: usize },
    Drained {
        summary: DrainSummary,
        notices: Vec<Notice>,
    },
}

pub fn sync(force: bool) -> Result<()> {
    let (engine, config, _) = open_engine()?;
    let outcome = runtime()?.block_on(sync_impl(&engine, &config.api_url, force))?;
    print!("{}", format_sync(&outcome));
    Ok(())
}

/// Internal implementation that accepts the engine for testing.
///
/// Without `force`, an unreachable API leaves the queue alone instead of
/// quarantining every entry as a network failure.
pub(crate) async fn sync_impl<S: LocalStore, R: RemoteEndpoint, C: ClockSource>(
    engine: &SyncEngine<S, R, C>,
    api_url: &str,
    force: bool,
) -> Result<SyncOutcome> {
    if !probe(engine, api_url).await && !force {
        return Ok(SyncOutcome::Offline {
            pending: engine.pending_count()?,
        });
    }

    let mut receiver = engine.events().subscribe_notices();
    let summary = engine.process_queue().await;
    let mut notices = Vec::new();
    while let Ok(notice) = receiver.try_recv() {
        notices.push(notice);
    }
    Ok(SyncOutcome::Drained { summary, notices })
}

pub(crate) fn format_sync(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Offline { pending } => format!(
            "API unreachable: {pending} pending request(s) left queued\n  \
             hint: use 'tally sync --force' to replay anyway\n"
        ),
        SyncOutcome::Drained { summary, notices }
            if summary.attempted() == 0 && notices.is_empty() =>
        {
            "Nothing to sync.\n".to_string()
        }
        SyncOutcome::Drained { summary, notices } => {
            let mut out = String::new();
            for notice in notices {
                out.push_str(&format!("{}\n", notice));
            }
            out.push_str(&format!(
                "Synced: {}, conflicts: {}, failed: {}, skipped: {}\n",
                summary.synced, summary.conflicts, summary.failed, summary.skipped
            ));
            out
        }
    }
}

pub fn retry(id: Option<i64>, all: bool) -> Result<()> {
    let (engine, _, _) = open_engine()?;
    println!("{}", retry_impl(&engine, id, all)?);
    Ok(())
}

pub(crate) fn retry_impl<S: LocalStore, R: RemoteEndpoint, C: ClockSource>(
    engine: &SyncEngine<S, R, C>,
    id: Option<i64>,
    all: bool,
) -> Result<String> {
    match id {
        Some(id) if !all => {
            let request = engine.failed_request(id)?;
            engine.retry_failed_request(&request)?;
            Ok(format!("Re-queued {} {}", request.method, request.url))
        }
        _ => {
            let count = engine.retry_all_failed_requests()?;
            Ok(format!("Re-queued {} failed request(s)", count))
        }
    }
}

pub fn dismiss(id: i64) -> Result<()> {
    let (engine, _, _) = open_engine()?;
    println!("{}", dismiss_impl(&engine, id)?);
    Ok(())
}

pub(crate) fn dismiss_impl<S: LocalStore, R: RemoteEndpoint, C: ClockSource>(
    engine: &SyncEngine<S, R, C>,
    id: i64,
) -> Result<String> {
    let request = engine.failed_request(id)?;
    engine.delete_failed_request(id)?;
    Ok(format!("Dismissed {} {}", request.method, request.url))
}

pub fn watch() -> Result<()> {
    let (engine, config, _) = open_engine()?;
    runtime()?.block_on(watch_async(engine, config))
}

/// Probe and drain in the background, printing activity until Ctrl-C.
async fn watch_async(engine: Engine, config: Config) -> Result<()> {
    let engine = Arc::new(engine);
    let cancel = CancellationToken::new();
    let interval = config.sync.probe_interval();

    let prober = tokio::spawn({
        let engine = Arc::clone(&engine);
        let cancel = cancel.clone();
        let url = config.api_url.clone();
        async move {
            probe_loop(engine.remote(), &url, engine.connectivity(), interval, cancel).await;
        }
    });
    let drainer = tokio::spawn({
        let engine = Arc::clone(&engine);
        let cancel = cancel.clone();
        async move { engine.run(cancel).await }
    });

    let mut notices = engine.events().subscribe_notices();
    let mut status = engine.events().watch_status();
    let mut online = engine.connectivity().subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    println!("Watching {} (Ctrl-C to stop)", config.api_url);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            notice = notices.recv() => match notice {
                Ok(notice) => println!("{}", notice),
                Err(RecvError::Lagged(missed)) => tracing::warn!(missed, "dropped notices"),
                Err(RecvError::Closed) => break,
            },
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let (pending, failed) = {
                    let snapshot = status.borrow_and_update();
                    (snapshot.pending_count(), snapshot.failed_count())
                };
                println!("queue: {} pending, {} failed", pending, failed);
            },
            changed = online.changed() => {
                if changed.is_err() {
                    break;
                }
                let now_online = *online.borrow_and_update();
                println!("{}", if now_online { "online" } else { "offline" });
            },
        }
    }

    cancel.cancel();
    // Give in-flight requests a moment; a drain never leaves storage half-updated.
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = prober.await;
        let _ = drainer.await;
    })
    .await;
    Ok(())
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
