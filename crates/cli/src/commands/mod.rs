// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod init;
pub mod queue;
pub mod record;
pub mod status;
pub mod sync;
#[cfg(test)]
#[path = "mod_tests.rs"]
pub mod testing;

use std::path::PathBuf;

use tally_core::{ClockSource, Database, LocalStore};
use tokio::runtime::Runtime;

use crate::config::{find_work_dir, get_db_path, Config};
use crate::error::{Error, Result};
use crate::sync::{ConnectivityMonitor, HttpEndpoint, RemoteEndpoint, SyncEngine};

/// The engine as wired for the command line.
pub type Engine = SyncEngine<Database, HttpEndpoint>;

/// Helper to open the engine from the current context.
pub fn open_engine() -> Result<(Engine, Config, PathBuf)> {
    let work_dir = find_work_dir()?;
    let config = Config::load(&work_dir)?;
    let db = Database::open(&get_db_path(&work_dir, &config))?;
    let endpoint = HttpEndpoint::new(config.sync.request_timeout())?;
    let engine = SyncEngine::new(db, endpoint, ConnectivityMonitor::new(false));
    Ok((engine, config, work_dir))
}

/// Runtime for commands that talk to the network.
pub fn runtime() -> Result<Runtime> {
    Runtime::new().map_err(|e| Error::Io(std::io::Error::other(format!("tokio: {}", e))))
}

/// Probe the API once and record the result on the engine.
pub async fn probe<S: LocalStore, R: RemoteEndpoint, C: ClockSource>(
    engine: &SyncEngine<S, R, C>,
    api_url: &str,
) -> bool {
    let online = engine.remote().probe(api_url).await;
    engine.connectivity().set_online(online);
    online
}
