//! End-to-end CLI smoke tests. Accounts always point at `127.0.0.1` so
//! a real binary invocation fails fast at connect time instead of
//! needing network access or a live IMAP server.

mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;

fn migrator_cmd() -> Command {
    cargo_bin_cmd!("imap-migrator")
}

#[test]
fn test_binary_exists() {
    let _cmd = migrator_cmd();
}

#[test]
fn test_cli_version() {
    let mut cmd = migrator_cmd();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("imap-migrator"));
}

#[test]
fn test_cli_help() {
    let mut cmd = migrator_cmd();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Bulk, parallel"));
}

#[test]
fn test_missing_accounts_file_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let config = common::write_config_json(tmp.path(), "");

    let mut cmd = migrator_cmd();
    cmd.current_dir(tmp.path());
    cmd.args(["--config", config.to_str().unwrap()]);
    cmd.assert().failure();
}

#[test]
fn test_empty_accounts_file_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    common::write_empty_accounts_csv(tmp.path());
    let config = common::write_config_json(tmp.path(), "");

    let mut cmd = migrator_cmd();
    cmd.current_dir(tmp.path());
    cmd.args(["--config", config.to_str().unwrap()]);
    cmd.assert().failure();
}

#[test]
fn test_preflight_failure_exits_nonzero_without_migrating() {
    let tmp = tempfile::tempdir().unwrap();
    common::write_accounts_csv(tmp.path(), &[("alice@old.com", "alice@new.com")]);
    let config = common::write_config_json(tmp.path(), "");

    let mut cmd = migrator_cmd();
    cmd.current_dir(tmp.path());
    cmd.args(["--config", config.to_str().unwrap()]);
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("Connection Verification"));

    // No report should have been written since phase 2 never ran.
    assert!(!tmp.path().join("reports").exists());
}

#[test]
fn test_invalid_config_date_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    common::write_accounts_csv(tmp.path(), &[("alice@old.com", "alice@new.com")]);
    let config = common::write_config_json(tmp.path(), "\"date_from\": \"not-a-date\"");

    let mut cmd = migrator_cmd();
    cmd.current_dir(tmp.path());
    cmd.args(["--config", config.to_str().unwrap()]);
    cmd.assert().failure();
}
