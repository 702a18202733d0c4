//! Migration policy: folder include/exclude, date/size filters, folder
//! name mapping and flattening. Loaded from a JSON document; see
//! `LoadConfig` in the original Go program for the exact defaulting
//! rules this mirrors.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemFolders {
    #[serde(default)]
    pub drafts: Vec<String>,
    #[serde(default)]
    pub sent: Vec<String>,
    #[serde(default)]
    pub junk: Vec<String>,
    #[serde(default)]
    pub trash: Vec<String>,
    #[serde(default)]
    pub archive: Vec<String>,
}

impl Default for SystemFolders {
    fn default() -> Self {
        SystemFolders {
            drafts: vec![
                "Drafts".into(),
                "INBOX.Drafts".into(),
                "[Gmail]/Drafts".into(),
            ],
            sent: vec![
                "Sent".into(),
                "Sent Messages".into(),
                "INBOX.Sent".into(),
                "[Gmail]/Sent Mail".into(),
            ],
            junk: vec![
                "Junk".into(),
                "Spam".into(),
                "INBOX.Junk".into(),
                "[Gmail]/Spam".into(),
            ],
            trash: vec![
                "Trash".into(),
                "Deleted Items".into(),
                "INBOX.Trash".into(),
                "[Gmail]/Trash".into(),
            ],
            archive: vec![
                "Archive".into(),
                "INBOX.Archive".into(),
                "[Gmail]/All Mail".into(),
            ],
        }
    }
}

/// Configuration document decoded from `config.json`, plus the parsed
/// date bounds derived from `date_from`/`date_to` at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    #[serde(default = "default_accounts_file")]
    pub accounts_file: String,
    #[serde(default)]
    pub max_concurrent_migrations: i64,
    #[serde(default)]
    pub skip_duplicates: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub max_message_size_mb: u64,
    #[serde(default)]
    pub flatten_folders: bool,

    #[serde(default)]
    pub exclude_folders: Vec<String>,
    #[serde(default)]
    pub include_folders: Vec<String>,

    #[serde(default)]
    pub date_from: String,
    #[serde(default)]
    pub date_to: String,

    #[serde(default)]
    pub folder_mapping: HashMap<String, String>,
    #[serde(default)]
    pub system_folders: SystemFolders,

    /// Parsed from `date_from`; not serialized.
    #[serde(skip)]
    pub date_from_parsed: Option<DateTime<Utc>>,
    /// Parsed from `date_to`, shifted to end-of-day; not serialized.
    #[serde(skip)]
    pub date_to_parsed: Option<DateTime<Utc>>,
}

fn default_accounts_file() -> String {
    "accounts.csv".to_string()
}

fn default_max_retries() -> u32 {
    3
}

impl Default for MigrationConfig {
    fn default() -> Self {
        MigrationConfig {
            accounts_file: default_accounts_file(),
            max_concurrent_migrations: 5,
            skip_duplicates: false,
            dry_run: false,
            max_retries: default_max_retries(),
            max_message_size_mb: 0,
            flatten_folders: false,
            exclude_folders: Vec::new(),
            include_folders: Vec::new(),
            date_from: String::new(),
            date_to: String::new(),
            folder_mapping: HashMap::new(),
            system_folders: SystemFolders::default(),
            date_from_parsed: None,
            date_to_parsed: None,
        }
    }
}

impl MigrationConfig {
    /// Load `config.json` from `path`; fall back to defaults if it does
    /// not exist. An unparsable date bound is a fatal load error.
    pub fn load(path: &Path) -> Result<MigrationConfig> {
        if !path.exists() {
            return Ok(MigrationConfig::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("error reading configuration file {}", path.display()))?;
        let mut config: MigrationConfig = serde_json::from_str(&content).map_err(|e| {
            crate::error::MigrationError::Config(format!("error parsing configuration JSON: {}", e))
        })?;

        if !config.date_from.is_empty() {
            let date = NaiveDate::parse_from_str(&config.date_from, "%Y-%m-%d").map_err(|e| {
                crate::error::MigrationError::Config(format!(
                    "invalid date format in date_from {}: {}",
                    config.date_from, e
                ))
            })?;
            config.date_from_parsed = Some(
                Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()),
            );
        }

        if !config.date_to.is_empty() {
            let date = NaiveDate::parse_from_str(&config.date_to, "%Y-%m-%d").map_err(|e| {
                crate::error::MigrationError::Config(format!(
                    "invalid date format in date_to {}: {}",
                    config.date_to, e
                ))
            })?;
            let start_of_day = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap());
            // End-of-day inclusive to the second: +24h - 1s.
            config.date_to_parsed =
                Some(start_of_day + chrono::Duration::hours(24) - chrono::Duration::seconds(1));
        }

        if config.accounts_file.is_empty() {
            config.accounts_file = default_accounts_file();
        }

        if config.max_concurrent_migrations <= 0 {
            config.max_concurrent_migrations = 5;
        }

        Ok(config)
    }

    /// Whitelist-then-blacklist folder inclusion check; both lists are
    /// exact-match, case-sensitive.
    pub fn should_include_folder(&self, folder_name: &str) -> bool {
        if !self.include_folders.is_empty()
            && !self.include_folders.iter().any(|f| f == folder_name)
        {
            return false;
        }
        !self.exclude_folders.iter().any(|f| f == folder_name)
    }

    /// Date/size filter; returns the triggering reason on rejection.
    pub fn should_include_message(
        &self,
        message_date: DateTime<Utc>,
        message_size: u64,
    ) -> (bool, String) {
        if let Some(from) = self.date_from_parsed {
            if message_date < from {
                return (false, format!("date before {}", self.date_from));
            }
        }
        if let Some(to) = self.date_to_parsed {
            if message_date > to {
                return (false, format!("date after {}", self.date_to));
            }
        }
        if self.max_message_size_mb > 0 {
            let max_bytes = self.max_message_size_mb * 1024 * 1024;
            if message_size > max_bytes {
                return (
                    false,
                    format!(
                        "size {} bytes exceeds limit of {} MB",
                        message_size, self.max_message_size_mb
                    ),
                );
            }
        }
        (true, String::new())
    }

    /// Exact-match mapping lookup, identity if absent.
    pub fn mapped_folder_name(&self, original_name: &str) -> String {
        self.folder_mapping
            .get(original_name)
            .cloned()
            .unwrap_or_else(|| original_name.to_string())
    }

    /// `.`/`/` → `_` rewrite, only when flattening is enabled.
    pub fn flatten_folder_name(&self, folder_name: &str) -> String {
        if !self.flatten_folders {
            return folder_name.to_string();
        }
        folder_name.replace('.', "_").replace('/', "_")
    }

    /// `flatten(map(name))`, matching `destNameFor` in the original spec.
    pub fn dest_name_for(&self, src_name: &str) -> String {
        self.flatten_folder_name(&self.mapped_folder_name(src_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_five_concurrent_migrations() {
        let cfg = MigrationConfig::default();
        assert_eq!(cfg.max_concurrent_migrations, 5);
        assert_eq!(cfg.max_retries, 3);
        assert!(!cfg.skip_duplicates);
        assert!(!cfg.dry_run);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let cfg = MigrationConfig::load(Path::new("/nonexistent/config.json")).unwrap();
        assert_eq!(cfg.accounts_file, "accounts.csv");
    }

    #[test]
    fn zero_or_negative_concurrency_coerced_to_five() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), r#"{"max_concurrent_migrations": -2}"#).unwrap();
        let cfg = MigrationConfig::load(tmp.path()).unwrap();
        assert_eq!(cfg.max_concurrent_migrations, 5);
    }

    #[test]
    fn should_include_folder_respects_whitelist_then_blacklist() {
        let mut cfg = MigrationConfig::default();
        cfg.include_folders = vec!["INBOX".into(), "Sent".into()];
        cfg.exclude_folders = vec!["Sent".into()];
        assert!(cfg.should_include_folder("INBOX"));
        assert!(!cfg.should_include_folder("Sent"));
        assert!(!cfg.should_include_folder("Trash"));
    }

    #[test]
    fn should_include_message_respects_date_bounds() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            r#"{"date_from": "2024-01-01", "date_to": "2024-01-31"}"#,
        )
        .unwrap();
        let cfg = MigrationConfig::load(tmp.path()).unwrap();

        let before = Utc.with_ymd_and_hms(2023, 12, 31, 12, 0, 0).unwrap();
        let within = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 1).unwrap();
        let boundary = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();

        assert!(!cfg.should_include_message(before, 0).0);
        assert!(cfg.should_include_message(within, 0).0);
        assert!(!cfg.should_include_message(after, 0).0);
        assert!(cfg.should_include_message(boundary, 0).0);
    }

    #[test]
    fn should_include_message_respects_size_cap() {
        let mut cfg = MigrationConfig::default();
        cfg.max_message_size_mb = 1;
        let now = Utc::now();
        assert!(cfg.should_include_message(now, 1024).0);
        let (ok, reason) = cfg.should_include_message(now, 2 * 1024 * 1024);
        assert!(!ok);
        assert!(reason.contains("exceeds limit"));
    }

    #[test]
    fn dest_name_for_applies_mapping_then_flatten() {
        let mut cfg = MigrationConfig::default();
        cfg.flatten_folders = true;
        cfg.folder_mapping
            .insert("INBOX.Sent".to_string(), "Sent".to_string());
        assert_eq!(cfg.dest_name_for("INBOX.Sent"), "Sent");
        assert_eq!(cfg.dest_name_for("INBOX.Archive"), "INBOX_Archive");
    }

    #[test]
    fn invalid_date_format_is_fatal() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), r#"{"date_from": "not-a-date"}"#).unwrap();
        assert!(MigrationConfig::load(tmp.path()).is_err());
    }
}
