// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `tally queue`: list pending or failed requests.

use tally_core::{ClockSource, FailedRequest, LocalStore, QueuedRequest};

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::sync::{RemoteEndpoint, SyncEngine};

use super::open_engine;

pub fn run(failed: bool, output: OutputFormat) -> Result<()> {
    let (engine, _, _) = open_engine()?;
    print!("{}", run_impl(&engine, failed, output)?);
    Ok(())
}

/// Internal implementation that accepts the engine for testing.
pub(crate) fn run_impl<S: LocalStore, R: RemoteEndpoint, C: ClockSource>(
    engine: &SyncEngine<S, R, C>,
    failed: bool,
    output: OutputFormat,
) -> Result<String> {
    if failed {
        let requests = engine.failed_requests()?;
        Ok(match output {
            OutputFormat::Text => format_failed(&requests),
            OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(&requests)?),
        })
    } else {
        let requests = engine.pending_requests()?;
        Ok(match output {
            OutputFormat::Text => format_pending(&requests),
            OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(&requests)?),
        })
    }
}

fn format_id(id: Option<i64>) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.to_string())
}

fn format_target(request: &QueuedRequest) -> String {
    request
        .effective_target()
        .map(|t| format!("  ({} {})", t.entity, t.record))
        .unwrap_or_default()
}

pub(crate) fn format_pending(requests: &[QueuedRequest]) -> String {
    if requests.is_empty() {
        return "No pending requests.\n".to_string();
    }
    let mut out = String::new();
    for request in requests {
        out.push_str(&format!(
            "{:>4}  {:<6} {}{}\n",
            format_id(request.id),
            request.method.as_str(),
            request.url,
            format_target(request),
        ));
    }
    out
}

pub(crate) fn format_failed(requests: &[FailedRequest]) -> String {
    if requests.is_empty() {
        return "No failed requests.\n".to_string();
    }
    let mut out = String::new();
    for request in requests {
        out.push_str(&format!(
            "{:>4}  {:<6} {}{}\n      failed {}: {}\n",
            format_id(request.id),
            request.method.as_str(),
            request.url,
            format_target(&request.to_queued()),
            request.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            request.error,
        ));
    }
    out
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
