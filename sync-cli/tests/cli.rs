//! End-to-end tests for the `hearth` binary against a temporary data dir.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

fn hearth(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("hearth").unwrap();
    // Keep the user's real config file out of the way
    cmd.arg("--config")
        .arg(dir.path().join("hearth.toml"))
        .arg("--data-dir")
        .arg(dir.path().join("data"))
        .env_remove("RUST_LOG");
    cmd
}

fn initialized() -> TempDir {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("hearth.toml"), "[logging]\nfilter = \"warn\"\n").unwrap();
    hearth(&dir).arg("init").assert().success();
    dir
}

#[test]
fn init_twice_fails() {
    let dir = initialized();

    hearth(&dir)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn set_get_and_remove_a_record() {
    let dir = initialized();

    hearth(&dir)
        .args(["set", "settings", "theme", "\"dark\""])
        .assert()
        .success();
    hearth(&dir)
        .args(["get", "settings", "theme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dark"));
    hearth(&dir)
        .args(["ls", "settings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("theme"));

    hearth(&dir).args(["rm", "settings", "theme"]).assert().success();
    hearth(&dir)
        .args(["get", "settings", "theme"])
        .assert()
        .failure();
}

#[test]
fn unknown_category_is_rejected() {
    let dir = initialized();

    hearth(&dir)
        .args(["ls", "passwords"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Valid categories"));
}

#[test]
fn queue_category_cannot_be_written() {
    let dir = initialized();
    hearth(&dir).args(["mood", "3"]).assert().success();

    hearth(&dir)
        .args(["set", "sync", "pending_changes", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reserved"));
    hearth(&dir).args(["clear", "sync"]).assert().failure();

    hearth(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pending: 1"));
}

#[test]
fn mood_is_listed_and_queued() {
    let dir = initialized();

    hearth(&dir)
        .args(["mood", "4", "--note", "Good walk"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queued"));
    hearth(&dir)
        .args(["list", "mood"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Good walk"));
    hearth(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pending: 1"));
}

#[test]
fn sync_without_remote_is_offline() {
    let dir = initialized();

    hearth(&dir)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("Offline"));
}
