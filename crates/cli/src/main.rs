// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::fs;

use clap::Parser;
use tallyrs::{find_work_dir, get_log_path, Cli};

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.command.default_log_level());
    if let Err(e) = tallyrs::run(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

/// Log to `.tally/tally.log` when inside a project, to stderr otherwise.
fn setup_logging(default_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let log_file = find_work_dir().ok().and_then(|work_dir| {
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(get_log_path(&work_dir))
            .ok()
    });

    if let Some(file) = log_file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
