// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `tally status`: connectivity and queue sizes at a glance.

use serde::Serialize;
use tally_core::{ClockSource, LocalStore};

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::sync::{RemoteEndpoint, SyncEngine};

use super::{open_engine, probe, runtime};

/// What `tally status` reports.
#[derive(Debug, Serialize)]
pub(crate) struct StatusReport {
    pub api_url: String,
    pub online: bool,
    pub pending: usize,
    pub failed: usize,
}

pub fn run(output: OutputFormat) -> Result<()> {
    let (engine, config, _) = open_engine()?;
    let report = runtime()?.block_on(collect(&engine, &config.api_url))?;
    match output {
        OutputFormat::Text => print!("{}", format_status(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

pub(crate) async fn collect<S: LocalStore, R: RemoteEndpoint, C: ClockSource>(
    engine: &SyncEngine<S, R, C>,
    api_url: &str,
) -> Result<StatusReport> {
    let online = probe(engine, api_url).await;
    Ok(StatusReport {
        api_url: api_url.to_string(),
        online,
        pending: engine.pending_count()?,
        failed: engine.failed_count()?,
    })
}

pub(crate) fn format_status(report: &StatusReport) -> String {
    let mut out = format!(
        "API: {} ({})\nPending: {}\nFailed: {}\n",
        report.api_url,
        if report.online { "online" } else { "offline" },
        report.pending,
        report.failed,
    );
    if report.failed > 0 {
        out.push_str("\nRun 'tally queue --failed' to inspect failed requests.\n");
    } else if report.pending > 0 && report.online {
        out.push_str("\nRun 'tally sync' to replay pending requests.\n");
    }
    out
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
