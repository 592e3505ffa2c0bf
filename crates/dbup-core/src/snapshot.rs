//! Base snapshot download.

use crate::error::{Error, Result};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Fetches a base snapshot into a local file.
pub trait SnapshotSource {
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// HTTP snapshot source over blocking reqwest.
///
/// No timeout is set: base dumps run to gigabytes and the transfer is an
/// operator-supervised step of provisioning.
#[derive(Debug, Default)]
pub struct HttpSnapshotSource;

impl SnapshotSource for HttpSnapshotSource {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let failed = |reason: String| Error::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        info!("Downloading base snapshot from {url} ...");

        let mut response = reqwest::blocking::get(url)
            .and_then(|r| r.error_for_status())
            .map_err(|e| failed(e.to_string()))?;

        let mut file = File::create(dest)?;
        let bytes = response
            .copy_to(&mut file)
            .map_err(|e| failed(e.to_string()))?;

        debug!("Downloaded {bytes} bytes to {}", dest.display());
        Ok(())
    }
}
