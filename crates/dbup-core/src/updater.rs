//! Provisioning and update lifecycle for one database.
//!
//! Binds a database kind's policy and a borrowed pool to the fetcher and the
//! subprocess applier. `create`, `populate` and `update` return
//! independently; the caller sequences them per database kind and decides
//! whether a failure stops the remaining kinds.

use crate::error::{Error, Result};
use crate::fetcher::{UpdateFetcher, UpdateOptions, UpdateResult};
use crate::pool::DatabasePool;
use crate::process::SqlApplier;
use crate::profile::{BaseLocation, DatabaseKind};
use crate::prompt::Prompt;
use crate::repository::SqlUpdateRepository;
use crate::snapshot::SnapshotSource;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Lifecycle position of one database during provisioning.
///
/// `Failed` is reachable from any state; the driver loop reports the state in
/// which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    Absent,
    Creating,
    Empty,
    Populating,
    Updating,
    Ready,
    Failed,
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProvisionState::Absent => "absent",
            ProvisionState::Creating => "creating",
            ProvisionState::Empty => "empty",
            ProvisionState::Populating => "populating",
            ProvisionState::Updating => "updating",
            ProvisionState::Ready => "ready",
            ProvisionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Run-time settings for one database's updater.
#[derive(Debug, Clone)]
pub struct UpdaterSettings {
    /// Root of the source tree holding `sql/base`, `sql/updates`, `sql/old`.
    pub source_dir: PathBuf,
    /// Fetcher policy knobs.
    pub options: UpdateOptions,
    /// Download base snapshots without asking.
    pub auto_db_update: bool,
    /// Snapshot URL for `Download`-based kinds.
    pub base_url: Option<String>,
}

/// Create/Populate/Update engine for a single database.
pub struct DbUpdater<'a> {
    kind: DatabaseKind,
    pool: &'a dyn DatabasePool,
    applier: &'a dyn SqlApplier,
    snapshots: &'a dyn SnapshotSource,
    settings: &'a UpdaterSettings,
}

impl<'a> DbUpdater<'a> {
    pub fn new(
        kind: DatabaseKind,
        pool: &'a dyn DatabasePool,
        applier: &'a dyn SqlApplier,
        snapshots: &'a dyn SnapshotSource,
        settings: &'a UpdaterSettings,
    ) -> Self {
        Self {
            kind,
            pool,
            applier,
            snapshots,
            settings,
        }
    }

    /// Create the target database through a scratch script.
    ///
    /// The scratch file is removed on every path; nothing persistent is
    /// written outside the server itself.
    pub fn create(&self) -> Result<()> {
        let database = self.pool.connection_info().database.clone();
        info!("Database \"{database}\" does not exist, automatically creating it...");

        let scratch = std::env::temp_dir().join(format!(
            "dbup_create_{}_{}.sql",
            std::process::id(),
            database
        ));
        std::fs::write(
            &scratch,
            format!(
                "CREATE DATABASE `{database}` DEFAULT CHARACTER SET utf8mb4 \
                 COLLATE utf8mb4_unicode_ci\n"
            ),
        )?;

        // No database selected: the statement runs against the server.
        let outcome = self
            .applier
            .apply_file(self.pool.connection_info(), "", &scratch);
        let _ = std::fs::remove_file(&scratch);

        outcome.map_err(|e| {
            error!(
                "Failed to create database {database}. Does the configured user have CREATE, \
                 ALTER, DROP, INSERT and DELETE privileges on the server?"
            );
            e
        })?;

        info!("Done.");
        Ok(())
    }

    /// True when the schema holds zero tables.
    pub fn schema_is_empty(&self) -> Result<bool> {
        Ok(self.pool.query("SHOW TABLES")?.is_empty())
    }

    /// Provision the schema from a base snapshot.
    ///
    /// Only acts on an empty schema, except for always-refresh kinds which
    /// re-resolve their snapshot on every run. A run without any resolved
    /// snapshot is a logged skip, not a failure.
    pub fn populate(&self, prompt: &mut dyn Prompt) -> Result<()> {
        let profile = self.kind.profile();

        if !profile.always_refresh && !self.schema_is_empty()? {
            return Ok(());
        }

        info!("Populating the {} database...", profile.display_name);

        let Some(base) = self.resolve_base(prompt)? else {
            info!(
                ">> No base snapshot resolved for {}; populate skipped for this run",
                profile.display_name
            );
            return Ok(());
        };

        self.apply_base(prompt, &base)
    }

    /// Decide where the base snapshot comes from.
    ///
    /// Download kinds walk the consent tree: auto-update downloads
    /// unconditionally, otherwise the operator may download, point at a local
    /// file, or decline everything. An empty path answer is an explicit skip;
    /// an empty path is never handed to the applier.
    fn resolve_base(&self, prompt: &mut dyn Prompt) -> Result<Option<PathBuf>> {
        let profile = self.kind.profile();
        let bundled = self.settings.source_dir.join(profile.base_file);

        if profile.base_location == BaseLocation::Repository {
            return Ok(Some(bundled));
        }

        let Some(url) = self.settings.base_url.as_deref() else {
            if bundled.is_file() {
                warn!(
                    "No snapshot URL configured for {}; falling back to the bundled file '{}'",
                    profile.display_name,
                    bundled.display()
                );
                return Ok(Some(bundled));
            }
            warn!(
                "No snapshot URL configured for {} and no bundled file at '{}'",
                profile.display_name,
                bundled.display()
            );
            return Ok(None);
        };

        let consent = if self.settings.auto_db_update {
            info!("auto_db_update enabled, proceeding with snapshot download");
            true
        } else {
            prompt.confirm(&format!(
                "Download and apply the latest {} base snapshot?",
                profile.display_name
            ))?
        };

        if consent {
            self.snapshots.download(url, &bundled)?;
            info!("Successfully downloaded {}", bundled.display());
            return Ok(Some(bundled));
        }

        if prompt.confirm("Use an existing local SQL file instead?")? {
            let line = prompt.input("Full path to local SQL file")?;
            let line = line.trim();
            if line.is_empty() {
                info!("No local file provided, skipping populate");
                return Ok(None);
            }
            info!("Using existing local file '{line}'");
            return Ok(Some(PathBuf::from(line)));
        }

        info!("Populate canceled by operator");
        Ok(None)
    }

    /// Apply the resolved snapshot, with a single bundled-default fallback.
    fn apply_base(&self, prompt: &mut dyn Prompt, base: &Path) -> Result<()> {
        let profile = self.kind.profile();
        let conn = self.pool.connection_info();

        info!(">> Applying base snapshot '{}'...", base.display());
        let Err(err) = self.applier.apply_file(conn, &conn.database, base) else {
            info!(">> {} database populated", profile.display_name);
            return Ok(());
        };

        let bundled = self.settings.source_dir.join(profile.base_file);
        if !bundled.is_file() || bundled == base {
            error!(
                "Base snapshot application failed for '{}' and no alternative bundled snapshot \
                 exists at '{}'. Place a valid dump there, supply a local file, or enable \
                 auto_db_update, then re-run.",
                conn.database,
                bundled.display()
            );
            return Err(err);
        }

        warn!(
            "Applying '{}' to '{}' failed, but a bundled default snapshot was found at '{}'",
            base.display(),
            conn.database,
            bundled.display()
        );

        if prompt.confirm(&format!(
            "Apply the bundled default snapshot for {} instead?",
            profile.display_name
        ))? {
            info!("Applying bundled default snapshot '{}'...", bundled.display());
            self.applier
                .apply_file(conn, &conn.database, &bundled)
                .map_err(|e| {
                    error!(
                        "Bundled default snapshot '{}' could not be applied either. Verify the \
                         file and re-run.",
                        bundled.display()
                    );
                    e
                })?;
            info!(">> {} database populated from the bundled default", profile.display_name);
            Ok(())
        } else {
            info!(
                "Operator declined the bundled default; database '{}' remains unchanged",
                conn.database
            );
            Err(Error::UserDeclined(conn.database.clone()))
        }
    }

    /// Enumerate and apply pending migrations via the fetcher.
    pub fn update(&self) -> Result<UpdateResult> {
        let profile = self.kind.profile();
        info!("Updating {} database...", profile.display_name);

        if !self.settings.source_dir.is_dir() {
            error!(
                "The configured source directory '{}' does not exist; point it at the tree \
                 containing your sql directory",
                self.settings.source_dir.display()
            );
            return Err(Error::SourceTreeMissing(self.settings.source_dir.clone()));
        }

        let repository = SqlUpdateRepository::new(self.pool);
        let fetcher = UpdateFetcher::new(
            &self.settings.source_dir,
            profile.update_subdir,
            self.pool.connection_info(),
            &repository,
            self.applier,
        );
        let result = fetcher.update(&self.settings.options)?;

        if result.updated {
            info!(
                ">> Applied {} queries. Containing {} new and {} archived updates.",
                result.recent + result.archived,
                result.recent,
                result.archived
            );
        } else {
            info!(
                ">> {} database is up-to-date! Containing {} new and {} archived updates.",
                profile.display_name, result.recent, result.archived
            );
        }
        Ok(result)
    }
}
