use once_cell::sync::Lazy;

/// Substrings that mark an IMAP error as a dropped/closed connection,
/// worth exactly one reconnect-and-retry. Centralized here so callers
/// never embed their own copy of the list.
static TRANSIENT_MARKERS: Lazy<[&str; 4]> = Lazy::new(|| {
    [
        "closed network connection",
        "EOF",
        "broken pipe",
        "connection reset",
    ]
});

/// Substrings that mark a destination-quota rejection. This is fatal for
/// the whole account pipeline, not just the message being appended.
static QUOTA_MARKERS: Lazy<[&str; 2]> = Lazy::new(|| ["OVERQUOTA", "Quota exceeded"]);

/// True if `message` matches one of the transient-disconnect markers.
pub fn is_transient(message: &str) -> bool {
    TRANSIENT_MARKERS.iter().any(|m| message.contains(m))
}

/// True if `message` matches one of the quota-exceeded markers.
pub fn is_quota_exceeded(message: &str) -> bool {
    QUOTA_MARKERS.iter().any(|m| message.contains(m))
}

/// Render an `anyhow::Error`'s full cause chain into one string. The
/// marker substrings above can show up on the underlying IMAP error
/// while an outer `.with_context()` message is what `Display` shows by
/// default — classification has to look at the whole chain, not just
/// the top frame.
pub fn error_chain_message(err: &anyhow::Error) -> String {
    err.chain()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

/// Derive the report filename's email component: `@` and `.` replaced
/// with `_at_`/`_`, matching `report.go`'s `safeEmail`.
pub fn safe_email(email: &str) -> String {
    email.replace('@', "_at_").replace('.', "_")
}

/// Truncate a folder name to 50 characters for the report's fixed-width
/// table, appending `...` when truncated.
pub fn truncate_folder_name(name: &str) -> String {
    if name.chars().count() <= 50 {
        return name.to_string();
    }
    let truncated: String = name.chars().take(47).collect();
    format!("{}...", truncated)
}

/// Human-readable `Xh Ym Zs` rendering of a duration, matching
/// `report.go`'s `formatDuration` (omitting leading zero components).
pub fn format_duration(d: std::time::Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs / 60) % 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
