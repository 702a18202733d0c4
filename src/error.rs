//! Error kinds and their migration-pipeline disposition.
//!
//! `corky` declares `thiserror` in its own `Cargo.toml` but never reaches
//! for it; this is the crate that does, because the disposition table
//! below (fatal vs. retryable vs. logged-and-continue) is exactly the
//! shape a typed error enum is for.

use thiserror::Error;

/// Top-level error kinds, matching the disposition table of the migration
/// design. Most per-message and per-folder failures are handled locally
/// inside the pipeline and never surface as one of these; this enum is
/// for the failures that cross a component boundary.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("accounts file error: {0}")]
    Input(String),

    #[error("could not connect to {host}: {source}")]
    Connect {
        host: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("authentication failed for {user}@{host}: {source}")]
    Auth {
        host: String,
        user: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("destination quota exceeded: {0}")]
    QuotaExceeded(String),
}
