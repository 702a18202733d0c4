//! Two-phase migration scheduler: a bounded-fan-out pre-flight
//! connection check for every account, then bounded-parallel dispatch
//! of one account pipeline per account (§4.6 of the design).

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;

use crate::accounts::Account;
use crate::config::MigrationConfig;
use crate::imap_session::{test_connection, Endpoint};
use crate::pipeline::migrate_account;
use crate::report::save_report;

/// Result of driving both phases for a set of accounts.
pub struct SchedulerOutcome {
    /// True iff every pre-flight probe succeeded and phase 2 ran.
    pub preflight_ok: bool,
    /// Reports written during phase 2, one per account (empty if
    /// pre-flight failed and phase 2 never ran).
    pub reports_written: usize,
}

/// Runs phase 1 (pre-flight) then, if it passes, phase 2 (migration)
/// for every account. Mirrors `main.go`'s top-level driver.
#[tokio::main(flavor = "multi_thread")]
pub async fn run(accounts: Vec<Account>, config: MigrationConfig, reports_dir: &Path) -> Result<SchedulerOutcome> {
    let preflight_ok = preflight(&accounts).await;

    if !preflight_ok {
        println!(
            "\none or more connections failed; fix the accounts file and try again."
        );
        return Ok(SchedulerOutcome {
            preflight_ok: false,
            reports_written: 0,
        });
    }

    println!(
        "\nall connections verified successfully. starting migration..."
    );
    println!("maximum concurrent migrations: {}", config.max_concurrent_migrations);

    let reports_written = migrate_all(accounts, config, reports_dir).await;

    println!("\nmigration process complete.");

    Ok(SchedulerOutcome {
        preflight_ok: true,
        reports_written,
    })
}

/// Phase 1: spawn two probes per account (source, destination),
/// collect human-readable result lines, sort them lexicographically
/// (a deliberate determinism feature preserved from the original),
/// then print. Returns whether every probe succeeded.
async fn preflight(accounts: &[Account]) -> bool {
    let mut handles = Vec::with_capacity(accounts.len() * 2);

    for account in accounts {
        let line = account.line;
        let source_email = account.source_email.clone();
        let source_endpoint = Endpoint::new(
            account.source_host.clone(),
            account.source_user.clone(),
            account.source_pass.clone(),
        );
        handles.push(tokio::task::spawn_blocking(move || {
            probe_result(line, "source", &source_email, &source_endpoint)
        }));

        let dest_email = account.destination_email.clone();
        let dest_endpoint = Endpoint::new(
            account.destination_host.clone(),
            account.destination_user.clone(),
            account.destination_pass.clone(),
        );
        handles.push(tokio::task::spawn_blocking(move || {
            probe_result(line, "destination", &dest_email, &dest_endpoint)
        }));
    }

    let mut lines = Vec::with_capacity(handles.len());
    let mut all_ok = true;
    for handle in handles {
        let (ok, line) = handle.await.unwrap_or_else(|e| (false, format!("probe task panicked: {}", e)));
        all_ok &= ok;
        lines.push(line);
    }

    lines.sort();

    println!("\n--- Connection Verification Report ---");
    for line in &lines {
        println!("{}", line);
    }
    println!("---------------------------------------");

    all_ok
}

fn probe_result(line: usize, role: &str, email: &str, endpoint: &Endpoint) -> (bool, String) {
    match test_connection(endpoint) {
        Ok(()) => (
            true,
            format!("[OK]   [line {}] {} {} ({}): ok", line, role, email, endpoint.host),
        ),
        Err(e) => (
            false,
            format!(
                "[FAIL] [line {}] {} {} ({}): failed - {}",
                line, role, email, endpoint.host, e
            ),
        ),
    }
}

/// Phase 2: run every account's pipeline under a semaphore bounding
/// concurrency to `config.max_concurrent_migrations`. One pipeline's
/// error is logged and never aborts its siblings; the scheduler waits
/// for all dispatched pipelines before returning.
async fn migrate_all(accounts: Vec<Account>, config: MigrationConfig, reports_dir: &Path) -> usize {
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_migrations.max(1) as usize));
    let config = Arc::new(config);
    let reports_dir = reports_dir.to_path_buf();

    let mut handles = Vec::with_capacity(accounts.len());
    for account in accounts {
        let permit_pool = semaphore.clone();
        let config = config.clone();
        let reports_dir = reports_dir.clone();

        handles.push(tokio::spawn(async move {
            // Acquired before spawn_blocking starts the pipeline,
            // released when this task returns on every exit path
            // (including the pipeline erroring out).
            let _permit = permit_pool.acquire_owned().await.expect("semaphore closed");
            tokio::task::spawn_blocking(move || run_one(&account, &config, &reports_dir))
                .await
                .unwrap_or_else(|e| {
                    println!("migration task panicked: {}", e);
                    false
                })
        }));
    }

    let mut written = 0;
    for handle in handles {
        if handle.await.unwrap_or(false) {
            written += 1;
        }
    }
    written
}

/// Runs one account's pipeline and saves its report; never propagates
/// an error up to the scheduler (pipeline failures are self-contained
/// in the report).
fn run_one(account: &Account, config: &MigrationConfig, reports_dir: &Path) -> bool {
    let outcome = match migrate_account(account, config) {
        Ok(o) => o,
        Err(e) => {
            println!(
                "migration error for {}: {}",
                account.source_email, e
            );
            return false;
        }
    };

    match save_report(&outcome.report, reports_dir) {
        Ok(path) => {
            println!(
                "[{}] report written to {}",
                account.source_email,
                path.display()
            );
        }
        Err(e) => {
            println!(
                "[{}] warning: could not save report: {}",
                account.source_email, e
            );
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semaphore_bound_coerces_zero_to_one() {
        // max_concurrent_migrations is already coerced to 5 by
        // MigrationConfig::load when <= 0; this guards the scheduler's
        // own defensive floor in case a config is constructed directly
        // (e.g. in a test) with a zero value.
        let bound = 0i64.max(1) as usize;
        assert_eq!(bound, 1);
    }
}
