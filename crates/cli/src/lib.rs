// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tallyrs - An offline-first sync client library.
//!
//! This crate provides the functionality behind the `tally` CLI tool: local
//! records are written first and their mutations replayed against a remote
//! REST API once it is reachable.
//!
//! # Main Components
//!
//! - [`sync::SyncEngine`] - Pending/failed queues, drain, reconciliation
//! - [`EntityService`] - Offline-first CRUD for one entity collection
//! - [`Config`] - Project configuration (API URL, database location)
//! - [`Error`] - Error types for all operations
//!
//! # Usage
//!
//! ```rust,ignore
//! use tallyrs::sync::{ConnectivityMonitor, HttpEndpoint, SyncEngine};
//! use tallyrs::EntityService;
//! use tally_core::{Database, EntityKind};
//!
//! let store = Database::open(&db_path)?;
//! let engine = SyncEngine::new(store, endpoint, ConnectivityMonitor::new(false));
//! let products = EntityService::new(&engine, EntityKind::Product, "http://localhost:3000/api");
//! products.create(serde_json::json!({"name": "Widget"}))?;
//! engine.process_queue().await;
//! ```

mod cli;
mod commands;

pub mod config;
pub mod error;
pub mod services;
pub mod sync;

pub use cli::{Cli, Command, OutputFormat, RecordCommand};
pub use config::{find_work_dir, get_db_path, get_log_path, init_work_dir, Config};
pub use error::{Error, Result};
pub use services::EntityService;

use clap::CommandFactory;
use clap_complete::generate;

/// Execute a CLI command. This is the main entry point for library users
/// and provides a testable way to run commands without process execution.
pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Init { api, database } => commands::init::run(&api, database.as_deref()),
        Command::Status { output } => commands::status::run(output),
        Command::Queue { failed, output } => commands::queue::run(failed, output),
        Command::Sync { force } => commands::sync::sync(force),
        Command::Retry { id, all } => commands::sync::retry(id, all),
        Command::Dismiss { id } => commands::sync::dismiss(id),
        Command::Record(cmd) => commands::record::run(cmd),
        Command::Watch => commands::sync::watch(),
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "tally", &mut std::io::stdout());
            Ok(())
        }
    }
}
