//! In-memory per-account migration report, plus the text renderer that
//! writes it to `reports/migration_<safeEmail>_<timestamp>.txt`. The
//! core pipeline only builds the in-memory record (§4.4 of the design);
//! rendering is an external collaborator, implemented here following
//! `report.go`'s exact layout since nothing downstream of this crate
//! would otherwise render it.

use std::io::Write;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::util::{format_duration, safe_email, truncate_folder_name};

/// Per destination-mapped folder within one account.
#[derive(Debug, Clone, Default)]
pub struct FolderStats {
    pub name: String,
    pub source_messages: u32,
    pub copied: u32,
    pub failed: u32,
    pub skipped: u32,
}

/// Per-account migration report, built incrementally during the
/// pipeline and handed to [`save_report`] at the end.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub source_email: String,
    pub destination_email: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub folders: Vec<FolderStats>,
    pub errors: Vec<String>,
    pub success: bool,
}

impl MigrationReport {
    pub fn new(source_email: impl Into<String>, destination_email: impl Into<String>) -> Self {
        MigrationReport {
            source_email: source_email.into(),
            destination_email: destination_email.into(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            folders: Vec::new(),
            errors: Vec::new(),
            success: false,
        }
    }

    pub fn duration(&self) -> Duration {
        (self.end_time - self.start_time)
            .to_std()
            .unwrap_or_default()
    }

    pub fn total_folders(&self) -> usize {
        self.folders.len()
    }

    pub fn total_source_messages(&self) -> u64 {
        self.folders.iter().map(|f| f.source_messages as u64).sum()
    }

    pub fn total_copied(&self) -> u64 {
        self.folders.iter().map(|f| f.copied as u64).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.folders.iter().map(|f| f.failed as u64).sum()
    }

    pub fn total_skipped(&self) -> u64 {
        self.folders.iter().map(|f| f.skipped as u64).sum()
    }
}

/// Render `report` into `reports/` (created with mode `0755` if
/// absent) and return the path written. Rendering failure is always
/// non-fatal to the caller — the pipeline's own success/failure is
/// already decided by the time this runs.
pub fn save_report(report: &MigrationReport, reports_dir: &std::path::Path) -> Result<std::path::PathBuf> {
    create_reports_dir(reports_dir)?;

    let timestamp = report.start_time.format("%Y%m%d_%H%M%S");
    let filename = format!("migration_{}_{}.txt", safe_email(&report.source_email), timestamp);
    let path = reports_dir.join(filename);

    let mut file = std::fs::File::create(&path)
        .with_context(|| format!("error creating report file {}", path.display()))?;

    render(report, &mut file)?;
    Ok(path)
}

#[cfg(unix)]
fn create_reports_dir(dir: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(dir)
        .with_context(|| format!("error creating reports directory {}", dir.display()))
}

#[cfg(not(unix))]
fn create_reports_dir(dir: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("error creating reports directory {}", dir.display()))
}

const RULE_HEAVY: &str = "═══════════════════════════════════════════════════════════════════════════";
const RULE_LIGHT: &str = "───────────────────────────────────────────────────────────────────────────";

fn render(report: &MigrationReport, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{}", RULE_HEAVY)?;
    writeln!(out, "                    IMAP MIGRATION REPORT")?;
    writeln!(out, "{}\n", RULE_HEAVY)?;

    writeln!(out, "Source:      {}", report.source_email)?;
    writeln!(out, "Destination: {}", report.destination_email)?;
    writeln!(out, "Start:       {}", report.start_time.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "End:         {}", report.end_time.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "Duration:    {}", format_duration(report.duration()))?;
    if report.success {
        writeln!(out, "Status:      ✓ COMPLETED SUCCESSFULLY")?;
    } else {
        writeln!(out, "Status:      ✗ INTERRUPTED (see errors below)")?;
    }
    writeln!(out)?;

    writeln!(out, "{}", RULE_LIGHT)?;
    writeln!(out, "                           SUMMARY")?;
    writeln!(out, "{}\n", RULE_LIGHT)?;

    writeln!(out, "Total folders processed:         {}", report.total_folders())?;
    writeln!(out, "Total messages at source:        {}", report.total_source_messages())?;
    writeln!(out, "Total messages copied:           {}", report.total_copied())?;
    writeln!(out, "Total messages failed:           {}", report.total_failed())?;
    writeln!(out, "Total messages skipped:          {}", report.total_skipped())?;

    let total_source = report.total_source_messages();
    if total_source > 0 {
        let rate = report.total_copied() as f64 / total_source as f64 * 100.0;
        writeln!(out, "Success rate:                    {:.2}%", rate)?;
    }
    writeln!(out)?;

    writeln!(out, "{}", RULE_LIGHT)?;
    writeln!(out, "                      FOLDER DETAILS")?;
    writeln!(out, "{}\n", RULE_LIGHT)?;

    writeln!(
        out,
        "{:<50} {:>8} {:>8} {:>8} {:>8}",
        "FOLDER", "SOURCE", "COPIED", "FAILED", "SKIPPED"
    )?;
    writeln!(
        out,
        "{:<50} {:>8} {:>8} {:>8} {:>8}",
        "-".repeat(50),
        "-".repeat(8),
        "-".repeat(8),
        "-".repeat(8),
        "-".repeat(8)
    )?;
    for folder in &report.folders {
        writeln!(
            out,
            "{:<50} {:>8} {:>8} {:>8} {:>8}",
            truncate_folder_name(&folder.name),
            folder.source_messages,
            folder.copied,
            folder.failed,
            folder.skipped
        )?;
    }
    writeln!(out)?;

    if !report.errors.is_empty() {
        writeln!(out, "{}", RULE_LIGHT)?;
        writeln!(out, "                            ERRORS")?;
        writeln!(out, "{}\n", RULE_LIGHT)?;
        for (i, err) in report.errors.iter().enumerate() {
            writeln!(out, "{}. {}", i + 1, err)?;
        }
        writeln!(out)?;
    } else {
        writeln!(out, "{}", RULE_LIGHT)?;
        writeln!(out, "                  ✓ NO ERRORS RECORDED")?;
        writeln!(out, "{}\n", RULE_LIGHT)?;
    }

    writeln!(out, "{}", RULE_HEAVY)?;
    let now: DateTime<Utc> = SystemTime::now().into();
    writeln!(out, "Report generated at: {}", now.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "{}", RULE_HEAVY)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_report() -> MigrationReport {
        let mut report = MigrationReport::new("alice@old.com", "alice@new.com");
        report.start_time = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        report.end_time = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 5).unwrap();
        report.folders.push(FolderStats {
            name: "INBOX".to_string(),
            source_messages: 3,
            copied: 3,
            failed: 0,
            skipped: 0,
        });
        report.success = true;
        report
    }

    #[test]
    fn totals_sum_across_folders() {
        let mut report = sample_report();
        report.folders.push(FolderStats {
            name: "Sent".to_string(),
            source_messages: 2,
            copied: 1,
            failed: 1,
            skipped: 0,
        });
        assert_eq!(report.total_source_messages(), 5);
        assert_eq!(report.total_copied(), 4);
        assert_eq!(report.total_failed(), 1);
    }

    #[test]
    fn render_includes_status_and_success_rate() {
        let report = sample_report();
        let mut buf = Vec::new();
        render(&report, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("COMPLETED SUCCESSFULLY"));
        assert!(text.contains("100.00%"));
        assert!(text.contains("NO ERRORS RECORDED"));
        assert!(text.contains("INBOX"));
    }

    #[test]
    fn render_includes_errors_block_when_present() {
        let mut report = sample_report();
        report.success = false;
        report.errors.push("quota exceeded on folder INBOX".to_string());
        let mut buf = Vec::new();
        render(&report, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("INTERRUPTED"));
        assert!(text.contains("1. quota exceeded on folder INBOX"));
        assert!(!text.contains("NO ERRORS RECORDED"));
    }

    #[test]
    fn save_report_writes_expected_filename() {
        let tmp = tempfile::tempdir().unwrap();
        let report = sample_report();
        let path = save_report(&report, tmp.path()).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "migration_alice_at_old_com_20240101_100000.txt"
        );
        assert!(path.exists());
    }
}
