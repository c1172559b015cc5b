// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// An API URL nothing listens on, so every request fails fast.
pub const OFFLINE_API: &str = "http://127.0.0.1:9/api";

pub fn tally() -> Command {
    cargo_bin_cmd!("tally")
}

/// Helper to create an initialized temp directory pointing at an offline API
pub fn init_temp() -> TempDir {
    let temp = TempDir::new().unwrap();
    tally()
        .arg("init")
        .arg("--api")
        .arg(OFFLINE_API)
        .current_dir(temp.path())
        .assert()
        .success();
    temp
}

/// Helper to create a record and return its temporary ID
pub fn add_record(temp: &TempDir, entity: &str, body: &str) -> String {
    let output = tally()
        .args(["record", "add", entity, body])
        .current_dir(temp.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "record add failed: {:?}", output);

    String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .find(|s| s.starts_with("tmp-"))
        .unwrap()
        .to_string()
}

/// Helper to read a command's stdout as JSON
pub fn json_output(temp: &TempDir, args: &[&str]) -> serde_json::Value {
    let output = tally().args(args).current_dir(temp.path()).output().unwrap();
    assert!(output.status.success(), "{:?} failed: {:?}", args, output);
    serde_json::from_slice(&output.stdout).unwrap()
}
