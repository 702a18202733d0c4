//! The account pipeline: for one (source, destination) pair, enumerate
//! source folders, replicate them at the destination, and copy every
//! message that passes the configured filters. All work within one
//! pipeline is strictly sequential — there is no parallel fetch or
//! append (§5 of the design).

use anyhow::Result;
use chrono::Utc;

use crate::accounts::Account;
use crate::config::MigrationConfig;
use crate::duplicates::{message_key, DuplicateTracker};
use crate::imap_session::{self, filter_valid_flags, Dialer, Endpoint, FetchedMessage, MailboxSession};
use crate::report::{FolderStats, MigrationReport};
use crate::util::is_quota_exceeded;

/// Outcome of one account pipeline. The report is always produced; a
/// pipeline that hits a fatal condition (initial session-open failure,
/// destination quota exceeded) still returns `Ok` with `report.success
/// == false` and the triggering error recorded in `report.errors` — the
/// scheduler only needs to log, never to distinguish by `Result`.
pub struct PipelineOutcome {
    pub report: MigrationReport,
}

/// Runs the full migration for one account. Sessions are opened here
/// and guaranteed to be logged out on every exit path.
pub fn migrate_account(account: &Account, config: &MigrationConfig) -> Result<PipelineOutcome> {
    println!(
        "[{}] starting migration -> {}",
        account.source_email, account.destination_email
    );

    let mut report = MigrationReport::new(&account.source_email, &account.destination_email);

    let source_endpoint = Endpoint::new(
        account.source_host.clone(),
        account.source_user.clone(),
        account.source_pass.clone(),
    );
    let dest_endpoint = Endpoint::new(
        account.destination_host.clone(),
        account.destination_user.clone(),
        account.destination_pass.clone(),
    );

    let mut source = match imap_session::connect(&source_endpoint) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error connecting to source: {}", e);
            println!("[{}] fatal: {}", account.source_email, msg);
            report.errors.push(msg);
            report.end_time = Utc::now();
            return Ok(PipelineOutcome { report });
        }
    };
    let mut dest = match imap_session::connect(&dest_endpoint) {
        Ok(s) => s,
        Err(e) => {
            source.logout();
            let msg = format!("error connecting to destination: {}", e);
            println!("[{}] fatal: {}", account.source_email, msg);
            report.errors.push(msg);
            report.end_time = Utc::now();
            return Ok(PipelineOutcome { report });
        }
    };

    let dialer: &Dialer<'_> = &imap_session::connect;

    let outcome = run_folders(
        account,
        config,
        &mut source,
        &source_endpoint,
        &mut dest,
        &dest_endpoint,
        dialer,
        &mut report,
    );

    source.logout();
    dest.logout();

    // A fatal folder/message-level error (quota exceeded) has already
    // recorded its own entry in `report.errors`; don't duplicate it.
    report.success = outcome.is_ok();
    report.end_time = Utc::now();

    println!(
        "[{}] done: {} source, {} copied, {} failed, {} skipped",
        account.source_email,
        report.total_source_messages(),
        report.total_copied(),
        report.total_failed(),
        report.total_skipped()
    );

    Ok(PipelineOutcome { report })
}

/// Performs an operation against `session`, retrying exactly once
/// through [`imap_session::reconnect_if_transient`] on failure. On a
/// non-transient error, or a transient error whose retry also fails,
/// returns the most recent error. `session` is a boxed trait object so
/// the reconnect helper can swap the pointee in place. `dialer` opens
/// the fresh session on reconnect — the real `connect` in production,
/// a fake-session-returning closure in tests.
fn with_reconnect<T>(
    session: &mut Box<dyn MailboxSession>,
    endpoint: &Endpoint,
    dialer: &Dialer<'_>,
    mut op: impl FnMut(&mut dyn MailboxSession) -> Result<T>,
) -> Result<T> {
    match op(session.as_mut()) {
        Ok(v) => Ok(v),
        Err(e) => {
            if imap_session::reconnect_if_transient(session, endpoint, dialer, &e) {
                op(session.as_mut())
            } else {
                Err(e)
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_folders(
    account: &Account,
    config: &MigrationConfig,
    source: &mut Box<dyn MailboxSession>,
    source_endpoint: &Endpoint,
    dest: &mut Box<dyn MailboxSession>,
    dest_endpoint: &Endpoint,
    dialer: &Dialer<'_>,
    report: &mut MigrationReport,
) -> Result<()> {
    let mailboxes = source
        .list()
        .map_err(|e| anyhow::anyhow!("error listing source folders: {}", e))?;
    println!(
        "[{}] found {} folder(s) to consider",
        account.source_email,
        mailboxes.len()
    );

    let skip_duplicates = config.skip_duplicates && !config.dry_run;

    // One tracker for the whole account: the duplicate key space spans
    // every destination folder, not just the one currently being
    // processed, so this must not be re-created per folder.
    let dup_tracker = if skip_duplicates {
        Some(DuplicateTracker::new())
    } else {
        None
    };

    for mailbox in &mailboxes {
        if mailbox.no_select {
            println!(
                "[{}] skipping non-selectable folder: {}",
                account.source_email, mailbox.name
            );
            continue;
        }

        let folder_name = &mailbox.name;
        if !config.should_include_folder(folder_name) {
            println!(
                "[{}] folder '{}' excluded by configuration filter",
                account.source_email, folder_name
            );
            continue;
        }

        let dest_folder_name = config.dest_name_for(folder_name);
        if dest_folder_name != *folder_name {
            println!(
                "[{}] folder '{}' will be created as '{}' at destination",
                account.source_email, folder_name, dest_folder_name
            );
        }

        let mut folder_stats = FolderStats {
            name: dest_folder_name.clone(),
            ..Default::default()
        };

        if !config.dry_run {
            if let Err(e) = with_reconnect(dest, dest_endpoint, dialer, |s| s.create(&dest_folder_name)) {
                println!(
                    "[{}] warning: could not create folder '{}' at destination (may already exist): {}",
                    account.destination_email, dest_folder_name, e
                );
            }

            if let Some(ref tracker) = dup_tracker {
                println!(
                    "[{}] building existing-message index for '{}'",
                    account.destination_email, dest_folder_name
                );
                tracker.build_existing_index(dest.as_mut(), &dest_folder_name);
            }
        } else {
            println!(
                "[{}] [dry-run] folder '{}' would be created as '{}'",
                account.source_email, folder_name, dest_folder_name
            );
        }

        let selected = match with_reconnect(source, source_endpoint, dialer, |s| s.select(folder_name, false)) {
            Ok(m) => m,
            Err(e) => {
                println!(
                    "[{}] error: could not select folder '{}' at source: {}",
                    account.source_email, folder_name, e
                );
                continue;
            }
        };

        folder_stats.source_messages = selected.exists;

        if selected.exists == 0 {
            println!(
                "[{}] folder '{}' is empty, advancing",
                account.source_email, folder_name
            );
            report.folders.push(folder_stats);
            continue;
        }

        let hi = selected.uid_next.saturating_sub(1);
        let fetch_folder_name = folder_name.clone();
        // Re-SELECT before every fetch attempt, not just on retry: a
        // session swapped in by reconnect has no folder selected yet,
        // and re-selecting an already-selected folder is harmless.
        let messages = match with_reconnect(source, source_endpoint, dialer, |s| {
            s.select(&fetch_folder_name, false)?;
            s.fetch_range(1, hi)
        }) {
            Ok(m) => m,
            Err(e) => {
                println!(
                    "[{}] error: failed to fetch messages from '{}': {}",
                    account.source_email, folder_name, e
                );
                continue;
            }
        };

        println!(
            "[{}] folder '{}' has {} message(s) to process",
            account.source_email,
            folder_name,
            messages.len()
        );

        if !config.dry_run {
            if let Err(e) = with_reconnect(dest, dest_endpoint, dialer, |s| s.select(&dest_folder_name, false)) {
                println!(
                    "[{}] error: could not select folder '{}' at destination: {}",
                    account.destination_email, dest_folder_name, e
                );
                continue;
            }
        }

        let outcome = process_messages(
            account,
            config,
            dest,
            folder_name,
            &dest_folder_name,
            messages,
            dup_tracker.as_ref(),
            &mut folder_stats,
            report,
        );

        report.folders.push(folder_stats);
        outcome?;
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn process_messages(
    account: &Account,
    config: &MigrationConfig,
    dest: &mut Box<dyn MailboxSession>,
    source_folder: &str,
    dest_folder: &str,
    messages: Vec<FetchedMessage>,
    dup_tracker: Option<&DuplicateTracker>,
    folder_stats: &mut FolderStats,
    report: &mut MigrationReport,
) -> Result<()> {
    let total = messages.len();

    for (i, message) in messages.into_iter().enumerate() {
        let idx = i + 1;

        if message.body.is_empty() {
            println!(
                "[{}] warning: message {}/{} in '{}' has an empty body, skipping",
                account.source_email, idx, total, source_folder
            );
            folder_stats.skipped += 1;
            continue;
        }

        let (include, reason) =
            config.should_include_message(message.envelope.date, message.body.len() as u64);
        if !include {
            println!(
                "[{}] message {}/{} skipped: {}",
                account.source_email, idx, total, reason
            );
            folder_stats.skipped += 1;
            continue;
        }

        if let Some(tracker) = dup_tracker {
            let key = message_key(
                &message.envelope.message_id,
                &message.envelope.subject,
                &message.envelope.from,
                message.envelope.date,
                message.body.len(),
            );
            if tracker.is_duplicate(&key) {
                println!(
                    "[{}] message {}/{} skipped: duplicate (key: {})",
                    account.source_email, idx, total, key
                );
                folder_stats.skipped += 1;
                continue;
            }
            tracker.mark_as_copied(&key);
        }

        let flags = filter_valid_flags(&message.flags);

        if config.dry_run {
            println!(
                "[{}] [dry-run] message {}/{} would be copied",
                account.source_email, idx, total
            );
            folder_stats.copied += 1;
            continue;
        }

        println!(
            "[{}] copying message {}/{} from '{}' ({} bytes)",
            account.source_email,
            idx,
            total,
            source_folder,
            message.body.len()
        );

        let mut last_err: Option<anyhow::Error> = None;
        for attempt in 0..=config.max_retries {
            if attempt > 0 {
                println!(
                    "[{}] retry {}/{} for message {}/{}",
                    account.source_email, attempt, config.max_retries, idx, total
                );
            }

            match dest.append(dest_folder, &message.body, &flags, message.envelope.date) {
                Ok(()) => {
                    last_err = None;
                    break;
                }
                Err(e) => {
                    let chain = crate::util::error_chain_message(&e);
                    if is_quota_exceeded(&chain) {
                        let err_msg = format!(
                            "destination quota exceeded while copying message {}/{} from '{}'",
                            idx, total, source_folder
                        );
                        report.errors.push(err_msg.clone());
                        println!(
                            "[{}] fatal: destination quota exceeded",
                            account.destination_email
                        );
                        return Err(crate::error::MigrationError::QuotaExceeded(err_msg).into());
                    }
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            None => {
                folder_stats.copied += 1;
                println!(
                    "[{}] message {}/{} copied successfully to '{}'",
                    account.source_email, idx, total, dest_folder
                );
            }
            Some(e) => {
                let err_msg = format!(
                    "failed to copy message {}/{} from '{}' after {} attempt(s): {}",
                    idx,
                    total,
                    source_folder,
                    config.max_retries + 1,
                    e
                );
                report.errors.push(err_msg.clone());
                folder_stats.failed += 1;
                println!("[{}] error: {}", account.source_email, err_msg);
            }
        }
    }

    Ok(())
}
