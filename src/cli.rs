use std::path::PathBuf;

use clap::Parser;

/// Bulk, parallel, server-to-server migration of mailbox contents
/// between two IMAP endpoints for many accounts described in a CSV
/// file.
#[derive(Parser)]
#[command(
    name = "imap-migrator",
    version,
    about = "Bulk, parallel IMAP-to-IMAP mailbox migration for many accounts",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Path to the configuration document.
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Override the accounts CSV path from the configuration document.
    #[arg(long)]
    pub accounts: Option<PathBuf>,

    /// Simulate the run: no CREATE or APPEND is issued.
    #[arg(long)]
    pub dry_run: bool,

    /// Override max_concurrent_migrations from the configuration document.
    #[arg(long)]
    pub max_concurrent: Option<i64>,

    /// Directory reports are written to.
    #[arg(long, default_value = "reports")]
    pub reports_dir: PathBuf,
}
