use anyhow::{Context, Result};
use clap::Parser;

use imap_migrator::accounts::load_accounts;
use imap_migrator::cli::Cli;
use imap_migrator::config::MigrationConfig;
use imap_migrator::scheduler;

fn main() -> Result<()> {
    let cli = Cli::parse();

    println!("starting imap-migrator...");

    let mut config = MigrationConfig::load(&cli.config)
        .with_context(|| format!("fatal error loading configuration from {}", cli.config.display()))?;

    if cli.dry_run {
        config.dry_run = true;
    }
    if let Some(max) = cli.max_concurrent {
        config.max_concurrent_migrations = if max <= 0 { 5 } else { max };
    }

    if config.dry_run {
        println!("*** DRY-RUN MODE ENABLED - no messages will actually be copied ***");
    }

    let accounts_path = cli.accounts.unwrap_or_else(|| config.accounts_file.clone().into());

    println!("checking connections...");
    let accounts = load_accounts(&accounts_path)
        .with_context(|| format!("fatal error reading accounts file {}", accounts_path.display()))?;

    let outcome = scheduler::run(accounts, config, &cli.reports_dir)?;

    if !outcome.preflight_ok {
        std::process::exit(1);
    }

    Ok(())
}
