//! Per-account duplicate index: a mutex-guarded set of message keys,
//! built by scanning a destination folder before appending into it.

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};

use crate::imap_session::MailboxSession;

/// Thread-safe set of observed duplicate keys, scoped to one account and
/// spanning all of that account's destination folders.
#[derive(Default)]
pub struct DuplicateTracker {
    seen: Mutex<HashSet<String>>,
}

impl DuplicateTracker {
    pub fn new() -> Self {
        DuplicateTracker::default()
    }

    /// Empty key always reports "not a duplicate".
    pub fn is_duplicate(&self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        self.seen.lock().unwrap().contains(key)
    }

    /// Empty key is a no-op.
    pub fn mark_as_copied(&self, key: &str) {
        if key.is_empty() {
            return;
        }
        self.seen.lock().unwrap().insert(key.to_string());
    }

    /// Scan `dest_folder` read-only and seed the index with every
    /// non-empty Message-ID found there. Failures are logged and treated
    /// as "no known duplicates" for this folder — never fatal.
    pub fn build_existing_index(&self, session: &mut dyn MailboxSession, dest_folder: &str) {
        let mailbox = match session.select(dest_folder, true) {
            Ok(mb) => mb,
            Err(e) => {
                eprintln!(
                    "warning: could not index existing messages in {}: {}",
                    dest_folder, e
                );
                return;
            }
        };

        if mailbox.exists == 0 {
            return;
        }

        let hi = mailbox.uid_next.saturating_sub(1);
        if hi < 1 {
            return;
        }

        match session.fetch_envelopes(1, hi) {
            Ok(envelopes) => {
                for envelope in envelopes {
                    if !envelope.message_id.is_empty() {
                        self.mark_as_copied(&envelope.message_id);
                    }
                }
            }
            Err(e) => {
                eprintln!(
                    "warning: could not fetch existing messages in {}: {}",
                    dest_folder, e
                );
            }
        }
    }
}

/// Derive a message's duplicate key: its Message-ID when present,
/// otherwise a 128-bit MD5 digest of `subject|from|date|body-size`.
pub fn message_key(
    message_id: &str,
    subject: &str,
    from: &str,
    date: DateTime<Utc>,
    body_size: usize,
) -> String {
    if !message_id.is_empty() {
        return message_id.to_string();
    }
    let input = format!("{}|{}|{}|{}", subject, from, date.to_rfc3339(), body_size);
    let digest = Md5::digest(input.as_bytes());
    hex::encode(digest)
}
