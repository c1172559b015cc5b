// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;
use common::*;
use yare::parameterized;

#[test]
fn creates_work_dir() {
    let temp = TempDir::new().unwrap();

    tally()
        .args(["init", "--api", "http://localhost:3000/api"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized tally"));

    assert!(temp.path().join(".tally/config.toml").exists());
    assert!(temp.path().join(".tally/tally.db").exists());
    assert!(temp.path().join(".tally/.gitignore").exists());
}

#[test]
fn fails_if_already_initialized() {
    let temp = init_temp();

    tally()
        .args(["init", "--api", OFFLINE_API])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[parameterized(
    no_scheme = { "localhost:3000" },
    websocket = { "ws://localhost:3000" },
)]
fn rejects_non_http_api(url: &str) {
    let temp = TempDir::new().unwrap();

    tally()
        .args(["init", "--api", url])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid API URL"));

    assert!(!temp.path().join(".tally").exists());
}

#[test]
fn commands_require_init() {
    let temp = TempDir::new().unwrap();

    tally()
        .arg("status")
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("tally init"));
}

#[test]
fn works_from_subdirectory() {
    let temp = init_temp();
    let nested = temp.path().join("a/b");
    std::fs::create_dir_all(&nested).unwrap();

    tally()
        .args(["record", "list", "product"])
        .current_dir(&nested)
        .assert()
        .success()
        .stdout(predicate::str::contains("No products stored locally."));
}

#[test]
fn completion_prints_script() {
    tally()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tally"));
}
