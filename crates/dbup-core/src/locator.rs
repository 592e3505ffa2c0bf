//! SQL client executable resolution.
//!
//! The configured client path is validated once; if it is not a regular file
//! the system PATH is searched and the corrected absolute path is cached for
//! the lifetime of the process. Safe to share read-only across database
//! kinds once resolved.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, error};

/// Process-wide corrected client path. Set at most once, never reset.
static CORRECTED_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Resolves and validates the path to the external SQL client binary.
#[derive(Debug, Clone)]
pub struct ClientLocator {
    default_path: PathBuf,
}

impl ClientLocator {
    pub fn new(default_path: impl Into<PathBuf>) -> Self {
        Self {
            default_path: default_path.into(),
        }
    }

    /// The corrected path if one was cached earlier, else the configured default.
    pub fn resolve(&self) -> PathBuf {
        CORRECTED_PATH
            .get()
            .cloned()
            .unwrap_or_else(|| self.default_path.clone())
    }

    /// Validate the resolved path, falling back to a PATH search.
    ///
    /// A successful PATH search caches the absolute location so every later
    /// call (from any database kind) resolves without searching again.
    pub fn ensure(&self) -> Result<PathBuf> {
        let exe = self.resolve();
        if exe.is_file() {
            return Ok(exe);
        }

        let name = exe
            .file_name()
            .map(Path::new)
            .unwrap_or_else(|| Path::new("mysql"));

        match which::which(name) {
            Ok(found) => {
                let absolute = found.canonicalize().unwrap_or(found);
                debug!("Corrected SQL client path to {}", absolute.display());
                let cached = CORRECTED_PATH.get_or_init(|| absolute).clone();
                Ok(cached)
            }
            Err(_) => {
                error!(
                    "Didn't find any executable SQL client binary at '{}' or in PATH",
                    exe.display()
                );
                Err(Error::ExecutableNotFound(exe))
            }
        }
    }
}
