//! Shared test fixtures: accounts CSV and configuration JSON builders.

#![allow(dead_code)]

use std::path::Path;

/// Write a minimal well-formed accounts CSV with `rows` (source_email,
/// destination_email) pairs, all pointing at `127.0.0.1` so a real CLI
/// invocation fails fast at connect time rather than hanging on DNS.
pub fn write_accounts_csv(dir: &Path, rows: &[(&str, &str)]) -> std::path::PathBuf {
    let path = dir.join("accounts.csv");
    let mut content = String::from(
        "source_email,source_user,source_pass,source_host,destination_email,destination_user,destination_pass,destination_host\n",
    );
    for (source_email, dest_email) in rows {
        content.push_str(&format!(
            "{0},{0},pw,127.0.0.1,{1},{1},pw,127.0.0.1\n",
            source_email, dest_email
        ));
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// Write an empty (header-only) accounts CSV.
pub fn write_empty_accounts_csv(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("accounts.csv");
    std::fs::write(
        &path,
        "source_email,source_user,source_pass,source_host,destination_email,destination_user,destination_pass,destination_host\n",
    )
    .unwrap();
    path
}

/// Write a configuration document; `extra` is a JSON object body
/// (without surrounding braces) or empty for an all-defaults config.
pub fn write_config_json(dir: &Path, extra: &str) -> std::path::PathBuf {
    let path = dir.join("config.json");
    let content = format!("{{{}}}", extra);
    std::fs::write(&path, content).unwrap();
    path
}
