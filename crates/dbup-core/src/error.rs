//! Error types for dbup-core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using dbup-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for migration operations
#[derive(Error, Debug)]
pub enum Error {
    // Executable resolution
    #[error(
        "No executable SQL client found at '{0}' or in PATH. Correct `client.executable` in the config."
    )]
    ExecutableNotFound(PathBuf),

    // Update run errors
    #[error("Migration source directory does not exist: {0}")]
    SourceTreeMissing(PathBuf),

    #[error("Applying '{file}' to database '{database}' failed (client exit status {status})")]
    ApplyFailed {
        file: String,
        database: String,
        status: i32,
    },

    #[error(
        "{count} applied migrations have no file on disk, more than the configured tolerance of {max}. \
         Refusing to prune; is the source directory pointed at the right tree?"
    )]
    DeadReferenceOverflow { count: usize, max: usize },

    // Provisioning errors
    #[error("Failed to download base snapshot from {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Operator declined every offered remedy for database '{0}'")]
    UserDeclined(String),

    // Collaborator errors
    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Prompt error: {0}")]
    Prompt(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an error from a failed subprocess application
    pub fn apply_failed(file: impl Into<String>, database: impl Into<String>, status: i32) -> Self {
        Self::ApplyFailed {
            file: file.into(),
            database: database.into(),
            status,
        }
    }
}
