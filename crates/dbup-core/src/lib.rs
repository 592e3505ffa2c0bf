//! dbup-core - schema migration engine.
//!
//! Discovers versioned SQL migration files, fingerprints their content,
//! decides what still needs applying, and drives the external SQL client to
//! apply them, recording the outcome in a bookkeeping table inside the target
//! database. Also provisions fresh databases from base snapshots with an
//! interactive fallback flow.
//!
//! Everything runs single-threaded and blocking: ordering of migrations
//! within a database is a correctness invariant, and the subprocess and
//! prompt boundaries are operator-controlled with no timeouts.

pub mod error;
pub mod fetcher;
pub mod locator;
pub mod pool;
pub mod process;
pub mod profile;
pub mod prompt;
pub mod repository;
pub mod snapshot;
pub mod updater;

pub use error::{Error, Result};
pub use fetcher::{FileCategory, MigrationFile, UpdateFetcher, UpdateOptions, UpdateResult};
pub use locator::ClientLocator;
pub use pool::{ConnectionInfo, DatabasePool};
pub use process::{ClientApplier, SqlApplier};
pub use profile::{BaseLocation, DatabaseKind, DatabaseProfile};
pub use prompt::{Answer, Prompt, ScriptedPrompt};
pub use repository::{AppliedRecord, RecordState, SqlUpdateRepository, UpdateRepository};
pub use snapshot::{HttpSnapshotSource, SnapshotSource};
pub use updater::{DbUpdater, ProvisionState, UpdaterSettings};
