// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use tally_core::{EntityKind, RecordId};

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn parse_entity(s: &str) -> Result<EntityKind, String> {
    s.parse().map_err(|e: tally_core::Error| e.to_string())
}

fn parse_record_id(s: &str) -> Result<RecordId, String> {
    s.parse().map_err(|e: tally_core::Error| e.to_string())
}

#[derive(Parser)]
#[command(name = "tally")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Offline-first sync client for a point-of-sale API")]
#[command(
    long_about = "Offline-first sync client for a point-of-sale API.\n\n\
    Records are written locally first and replayed against the API when it is reachable."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize tally in the current directory
    #[command(after_help = "\
Examples:
  tally init --api http://localhost:3000/api
  tally init --api https://pos.example.com/api --database /var/lib/tally/pos.db")]
    Init {
        /// Base URL of the remote API
        #[arg(long, value_name = "URL")]
        api: String,

        /// Database path (relative to .tally/ or absolute)
        #[arg(long, value_name = "PATH")]
        database: Option<String>,
    },

    /// Show connectivity and queue sizes
    Status {
        /// Output format
        #[arg(long, short, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// List queued requests
    Queue {
        /// List failed requests instead of pending ones
        #[arg(long)]
        failed: bool,

        /// Output format
        #[arg(long, short, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Replay pending requests now
    Sync {
        /// Replay even if the API looks unreachable
        #[arg(long)]
        force: bool,
    },

    /// Move failed requests back to the pending queue
    #[command(group(ArgGroup::new("which").required(true).args(["id", "all"])))]
    Retry {
        /// Failed request ID
        id: Option<i64>,

        /// Retry every failed request
        #[arg(long)]
        all: bool,
    },

    /// Delete a failed request without replaying it
    Dismiss {
        /// Failed request ID
        id: i64,
    },

    /// Create, change and inspect local records
    #[command(subcommand)]
    Record(RecordCommand),

    /// Replay the queue every time the API becomes reachable
    Watch,

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum RecordCommand {
    /// Create a record (gets a temporary tmp-… id until synced)
    #[command(after_help = "\
Examples:
  tally record add product '{\"name\": \"Widget\", \"price\": 4.5}'
  tally record add customer '{\"name\": \"Ada\"}'")]
    Add {
        /// Entity kind (product, customer, sale, purchase, supplier)
        #[arg(value_parser = parse_entity)]
        entity: EntityKind,

        /// Record body as a JSON object
        body: String,
    },

    /// Replace a record's body
    Update {
        #[arg(value_parser = parse_entity)]
        entity: EntityKind,

        /// Record ID (tmp-… for records not yet synced)
        #[arg(value_parser = parse_record_id)]
        id: RecordId,

        /// New body as a JSON object
        body: String,
    },

    /// Change some fields of a record
    Patch {
        #[arg(value_parser = parse_entity)]
        entity: EntityKind,

        #[arg(value_parser = parse_record_id)]
        id: RecordId,

        /// Fields to change as a JSON object
        fields: String,
    },

    /// Delete a record
    Delete {
        #[arg(value_parser = parse_entity)]
        entity: EntityKind,

        #[arg(value_parser = parse_record_id)]
        id: RecordId,
    },

    /// Show one record
    Get {
        #[arg(value_parser = parse_entity)]
        entity: EntityKind,

        #[arg(value_parser = parse_record_id)]
        id: RecordId,
    },

    /// List local records
    List {
        #[arg(value_parser = parse_entity)]
        entity: EntityKind,

        /// Output format
        #[arg(long, short, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Replace local records with the server's copy
    Refresh {
        #[arg(value_parser = parse_entity)]
        entity: EntityKind,
    },
}

impl Command {
    /// Default log filter when `RUST_LOG` is unset.
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Command::Watch => "info",
            _ => "warn",
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
