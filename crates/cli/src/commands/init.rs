// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use tally_core::Database;

use crate::config::{get_db_path, init_work_dir, Config};
use crate::error::Result;

pub fn run(api: &str, database: Option<&str>) -> Result<()> {
    let target_path = std::env::current_dir()?;
    run_impl(&target_path, api, database)
}

/// Internal implementation that accepts the target path for testing.
pub(crate) fn run_impl(target_path: &Path, api: &str, database: Option<&str>) -> Result<()> {
    let work_dir = init_work_dir(target_path, api, database)?;
    let config = Config::load(&work_dir)?;

    // Create the database and its schema up front
    let db_path = get_db_path(&work_dir, &config);
    Database::open(&db_path)?;

    println!("Initialized tally at {}", work_dir.display());
    println!("API: {}", config.api_url);
    println!("Database: {}", db_path.display());
    Ok(())
}

#[cfg(test)]
#[path = "init_tests.rs"]
mod tests;
