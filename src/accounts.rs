//! Accounts file: a header-first CSV of source/destination endpoint pairs.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One (source, destination) endpoint pair. Identity is the line index
/// in the input file; emails are labels only, not used for login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub line: usize,
    pub source_email: String,
    pub source_user: String,
    pub source_pass: String,
    pub source_host: String,
    pub destination_email: String,
    pub destination_user: String,
    pub destination_pass: String,
    pub destination_host: String,
}

/// Read the accounts CSV at `path`. The header line is discarded. Rows
/// with fewer than 8 trimmed fields are logged and skipped. An accounts
/// file with zero usable rows is a fatal input error.
pub fn load_accounts(path: &Path) -> Result<Vec<Account>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("error opening accounts file {}", path.display()))?;

    let mut accounts = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let line = idx + 2; // 1-based, plus the discarded header line
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                eprintln!("warning: skipping malformed row at line {}: {}", line, e);
                continue;
            }
        };

        if record.len() < 8 {
            eprintln!(
                "warning: skipping row at line {} ({} field(s), need 8)",
                line,
                record.len()
            );
            continue;
        }

        accounts.push(Account {
            line,
            source_email: record[0].trim().to_string(),
            source_user: record[1].trim().to_string(),
            source_pass: record[2].trim().to_string(),
            source_host: record[3].trim().to_string(),
            destination_email: record[4].trim().to_string(),
            destination_user: record[5].trim().to_string(),
            destination_pass: record[6].trim().to_string(),
            destination_host: record[7].trim().to_string(),
        });
    }

    if accounts.is_empty() {
        return Err(crate::error::MigrationError::Input(format!(
            "accounts file {} contains no usable rows",
            path.display()
        ))
        .into());
    }

    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(content.as_bytes()).unwrap();
        tmp
    }

    #[test]
    fn loads_well_formed_rows() {
        let tmp = write_csv(
            "source_email,source_user,source_pass,source_host,destination_email,destination_user,destination_pass,destination_host\n\
             alice@old.com,alice,pw1,imap.old.com,alice@new.com,alice,pw2,imap.new.com\n",
        );
        let accounts = load_accounts(tmp.path()).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].source_host, "imap.old.com");
        assert_eq!(accounts[0].destination_host, "imap.new.com");
        assert_eq!(accounts[0].line, 2);
    }

    #[test]
    fn skips_rows_with_too_few_fields() {
        let tmp = write_csv(
            "h1,h2,h3,h4,h5,h6,h7,h8\n\
             a,b,c\n\
             alice@old.com,alice,pw1,imap.old.com,alice@new.com,alice,pw2,imap.new.com\n",
        );
        let accounts = load_accounts(tmp.path()).unwrap();
        assert_eq!(accounts.len(), 1);
    }

    #[test]
    fn trims_whitespace_in_fields() {
        let tmp = write_csv(
            "h1,h2,h3,h4,h5,h6,h7,h8\n\
             \" alice@old.com \",alice,pw1,imap.old.com,alice@new.com,alice,pw2,imap.new.com\n",
        );
        let accounts = load_accounts(tmp.path()).unwrap();
        assert_eq!(accounts[0].source_email, "alice@old.com");
    }

    #[test]
    fn empty_file_is_fatal() {
        let tmp = write_csv("h1,h2,h3,h4,h5,h6,h7,h8\n");
        assert!(load_accounts(tmp.path()).is_err());
    }
}
