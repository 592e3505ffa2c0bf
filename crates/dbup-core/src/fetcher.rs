//! Migration discovery, classification, and application.
//!
//! Scans the source tree for versioned SQL files, compares content
//! fingerprints against the applied-set, and drives pending files through the
//! applier in strict name order. Ordering is a correctness invariant: later
//! files may assume schema state created by earlier ones, so migrations are
//! never applied concurrently or out of order.

use crate::error::{Error, Result};
use crate::pool::ConnectionInfo;
use crate::process::SqlApplier;
use crate::repository::{AppliedRecord, RecordState, UpdateRepository};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where a migration file was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    /// Lives under the updates directory; the normal case.
    Ordinary,
    /// Retained under the archive directory after being superseded.
    Archived,
}

impl FileCategory {
    fn record_state(self) -> RecordState {
        match self {
            FileCategory::Ordinary => RecordState::Active,
            FileCategory::Archived => RecordState::Archived,
        }
    }
}

/// One candidate migration file, immutable once read for a run.
#[derive(Debug, Clone)]
pub struct MigrationFile {
    pub name: String,
    pub path: PathBuf,
    pub category: FileCategory,
}

/// Aggregate outcome of one update run. Transient, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Newly applied or re-applied ordinary migrations.
    pub recent: usize,
    /// Archived migrations applied.
    pub archived: usize,
    /// Whether anything was applied at all.
    pub updated: bool,
}

/// Policy knobs for one update run.
#[derive(Debug, Clone, Copy)]
pub struct UpdateOptions {
    /// Re-apply ordinary migrations whose content changed since application.
    pub redundancy: bool,
    /// Permit refreshing an archived record's missing fingerprint in place.
    pub allow_rehash: bool,
    /// Re-apply archived migrations whose content changed.
    pub archived_redundancy: bool,
    /// Dead records up to this count are pruned; beyond it the run fails.
    /// Negative disables the limit entirely.
    pub clean_dead_ref_max_count: i64,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            redundancy: true,
            allow_rehash: true,
            archived_redundancy: false,
            clean_dead_ref_max_count: 3,
        }
    }
}

/// SHA-256 hex fingerprint of a file's bytes.
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Enumerates and applies pending migrations for one database.
pub struct UpdateFetcher<'a> {
    ordinary_dir: PathBuf,
    archived_dir: PathBuf,
    conn: &'a ConnectionInfo,
    repository: &'a dyn UpdateRepository,
    applier: &'a dyn SqlApplier,
}

impl<'a> UpdateFetcher<'a> {
    /// `source_dir` is the repository root; migrations live under
    /// `sql/updates/<subdir>` with superseded ones under `sql/old/<subdir>`.
    pub fn new(
        source_dir: &Path,
        subdir: &str,
        conn: &'a ConnectionInfo,
        repository: &'a dyn UpdateRepository,
        applier: &'a dyn SqlApplier,
    ) -> Self {
        Self {
            ordinary_dir: source_dir.join("sql").join("updates").join(subdir),
            archived_dir: source_dir.join("sql").join("old").join(subdir),
            conn,
            repository,
            applier,
        }
    }

    /// Run one full fetch-and-apply pass.
    pub fn update(&self, opts: &UpdateOptions) -> Result<UpdateResult> {
        if !self.ordinary_dir.is_dir() {
            return Err(Error::SourceTreeMissing(self.ordinary_dir.clone()));
        }

        let files = self.enumerate()?;

        self.repository.ensure_schema()?;
        let mut records: HashMap<String, AppliedRecord> = self
            .repository
            .applied()?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();

        let mut result = UpdateResult::default();

        for file in &files {
            match records.remove(&file.name) {
                None => {
                    self.apply(file, &mut result)?;
                }
                Some(record) => {
                    let fingerprint = fingerprint_file(&file.path)?;

                    if record.fingerprint == fingerprint {
                        // Content untouched; fix a stale state flag if the
                        // file moved between the updates and archive trees.
                        let expected = file.category.record_state();
                        if record.state != expected {
                            debug!(
                                "Correcting state of '{}' to {}",
                                file.name, expected
                            );
                            self.repository.set_state(&file.name, expected)?;
                        }
                        continue;
                    }

                    // Missing fingerprint on an archived record is a
                    // bookkeeping gap, not drift; refresh it without
                    // re-applying when rehash is allowed.
                    if record.fingerprint.is_empty()
                        && file.category == FileCategory::Archived
                        && opts.allow_rehash
                    {
                        info!("Rehashing '{}' without re-applying", file.name);
                        self.repository.set_fingerprint(&file.name, &fingerprint)?;
                        continue;
                    }

                    let allowed = match file.category {
                        FileCategory::Ordinary => opts.redundancy,
                        FileCategory::Archived => opts.archived_redundancy,
                    };

                    if allowed {
                        info!("Re-applying modified migration '{}'", file.name);
                        self.apply(file, &mut result)?;
                    } else {
                        warn!(
                            "Migration '{}' changed since it was applied to '{}' but redundancy \
                             is disabled; skipping",
                            file.name, self.conn.database
                        );
                    }
                }
            }
        }

        self.clean_dead_references(records, opts)?;

        result.updated = result.recent + result.archived > 0;
        Ok(result)
    }

    /// Recursively collect `.sql` files from both trees, sorted by name.
    fn enumerate(&self) -> Result<Vec<MigrationFile>> {
        let mut files = Vec::new();
        collect_sql_files(&self.ordinary_dir, FileCategory::Ordinary, &mut files)?;
        if self.archived_dir.is_dir() {
            collect_sql_files(&self.archived_dir, FileCategory::Archived, &mut files)?;
        }

        // Migration names encode version order; sorting by name fixes the
        // application sequence.
        files.sort_by(|a, b| a.name.cmp(&b.name));

        debug!(
            "Found {} candidate migrations for '{}'",
            files.len(),
            self.conn.database
        );
        Ok(files)
    }

    fn apply(&self, file: &MigrationFile, result: &mut UpdateResult) -> Result<()> {
        info!("Applying '{}' to '{}'...", file.name, self.conn.database);

        let started = Instant::now();
        self.applier
            .apply_file(self.conn, &self.conn.database, &file.path)?;
        let speed_ms = started.elapsed().as_millis() as u64;

        let record = AppliedRecord {
            name: file.name.clone(),
            fingerprint: fingerprint_file(&file.path)?,
            state: file.category.record_state(),
        };
        self.repository.upsert(&record, speed_ms)?;

        match file.category {
            FileCategory::Ordinary => result.recent += 1,
            FileCategory::Archived => result.archived += 1,
        }
        Ok(())
    }

    /// Prune records whose file no longer exists, within tolerance.
    ///
    /// A flood of dead references usually means the source directory is
    /// wrong, not that someone deleted the whole history; fail before
    /// touching any row in that case so the failure is idempotent.
    fn clean_dead_references(
        &self,
        dead: HashMap<String, AppliedRecord>,
        opts: &UpdateOptions,
    ) -> Result<()> {
        if dead.is_empty() {
            return Ok(());
        }

        let max = opts.clean_dead_ref_max_count;
        if max >= 0 && dead.len() as i64 > max {
            return Err(Error::DeadReferenceOverflow {
                count: dead.len(),
                max: max as usize,
            });
        }

        let mut names: Vec<&String> = dead.keys().collect();
        names.sort();
        for name in names {
            warn!(
                "Pruning applied migration '{}' from '{}': no file on disk",
                name, self.conn.database
            );
            self.repository.remove(name)?;
        }
        Ok(())
    }
}

fn collect_sql_files(
    dir: &Path,
    category: FileCategory,
    out: &mut Vec<MigrationFile>,
) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_sql_files(&path, category, out)?;
        } else if path.extension().is_some_and(|ext| ext == "sql") {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            out.push(MigrationFile {
                name,
                path,
                category,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn conn_info() -> ConnectionInfo {
        ConnectionInfo {
            host: "localhost".to_string(),
            user: "root".to_string(),
            password: String::new(),
            port_or_socket: "3306".to_string(),
            database: "auth".to_string(),
            tls: false,
        }
    }

    /// In-memory applied-set.
    #[derive(Default)]
    struct MemoryRepository {
        rows: RefCell<BTreeMap<String, AppliedRecord>>,
    }

    impl MemoryRepository {
        fn seed(&self, name: &str, fingerprint: &str, state: RecordState) {
            self.rows.borrow_mut().insert(
                name.to_string(),
                AppliedRecord {
                    name: name.to_string(),
                    fingerprint: fingerprint.to_string(),
                    state,
                },
            );
        }

        fn fingerprint_of(&self, name: &str) -> Option<String> {
            self.rows.borrow().get(name).map(|r| r.fingerprint.clone())
        }
    }

    impl UpdateRepository for MemoryRepository {
        fn ensure_schema(&self) -> Result<()> {
            Ok(())
        }

        fn applied(&self) -> Result<Vec<AppliedRecord>> {
            Ok(self.rows.borrow().values().cloned().collect())
        }

        fn upsert(&self, record: &AppliedRecord, _speed_ms: u64) -> Result<()> {
            self.rows
                .borrow_mut()
                .insert(record.name.clone(), record.clone());
            Ok(())
        }

        fn set_state(&self, name: &str, state: RecordState) -> Result<()> {
            if let Some(r) = self.rows.borrow_mut().get_mut(name) {
                r.state = state;
            }
            Ok(())
        }

        fn set_fingerprint(&self, name: &str, fingerprint: &str) -> Result<()> {
            if let Some(r) = self.rows.borrow_mut().get_mut(name) {
                r.fingerprint = fingerprint.to_string();
            }
            Ok(())
        }

        fn remove(&self, name: &str) -> Result<()> {
            self.rows.borrow_mut().remove(name);
            Ok(())
        }
    }

    /// Records applied files instead of spawning a client.
    #[derive(Default)]
    struct RecordingApplier {
        applied: RefCell<Vec<String>>,
        fail_on: Option<String>,
    }

    impl SqlApplier for RecordingApplier {
        fn apply_file(&self, _conn: &ConnectionInfo, database: &str, script: &Path) -> Result<()> {
            let name = script
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if self.fail_on.as_deref() == Some(name.as_str()) {
                return Err(Error::apply_failed(name, database, 1));
            }
            self.applied.borrow_mut().push(name);
            Ok(())
        }
    }

    struct Fixture {
        temp: TempDir,
        conn: ConnectionInfo,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = tempfile::tempdir().expect("Failed to create temp dir");
            std::fs::create_dir_all(temp.path().join("sql/updates/auth"))
                .expect("Failed to create updates dir");
            Self {
                temp,
                conn: conn_info(),
            }
        }

        fn write_ordinary(&self, name: &str, content: &str) -> PathBuf {
            let path = self.temp.path().join("sql/updates/auth").join(name);
            std::fs::write(&path, content).expect("Failed to write migration");
            path
        }

        fn write_archived(&self, name: &str, content: &str) -> PathBuf {
            let dir = self.temp.path().join("sql/old/auth");
            std::fs::create_dir_all(&dir).expect("Failed to create archive dir");
            let path = dir.join(name);
            std::fs::write(&path, content).expect("Failed to write migration");
            path
        }

        fn fetcher<'a>(
            &'a self,
            repo: &'a MemoryRepository,
            applier: &'a RecordingApplier,
        ) -> UpdateFetcher<'a> {
            UpdateFetcher::new(self.temp.path(), "auth", &self.conn, repo, applier)
        }
    }

    #[test]
    fn test_fresh_run_applies_in_name_order() {
        let fx = Fixture::new();
        // Written out of order on purpose.
        fx.write_ordinary("002_accounts.sql", "CREATE TABLE accounts (id INT);");
        fx.write_ordinary("001_init.sql", "CREATE TABLE realms (id INT);");

        let repo = MemoryRepository::default();
        let applier = RecordingApplier::default();

        let result = fx
            .fetcher(&repo, &applier)
            .update(&UpdateOptions {
                clean_dead_ref_max_count: 0,
                ..UpdateOptions::default()
            })
            .expect("Update failed");

        assert_eq!(result.recent, 2);
        assert_eq!(result.archived, 0);
        assert!(result.updated);
        assert_eq!(
            *applier.applied.borrow(),
            vec!["001_init.sql".to_string(), "002_accounts.sql".to_string()]
        );
        assert!(repo.fingerprint_of("001_init.sql").is_some());
        assert!(repo.fingerprint_of("002_accounts.sql").is_some());
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let fx = Fixture::new();
        fx.write_ordinary("001_init.sql", "CREATE TABLE realms (id INT);");

        let repo = MemoryRepository::default();
        let applier = RecordingApplier::default();
        let opts = UpdateOptions::default();

        fx.fetcher(&repo, &applier).update(&opts).expect("First run failed");
        let second = fx
            .fetcher(&repo, &applier)
            .update(&opts)
            .expect("Second run failed");

        assert_eq!(second, UpdateResult::default());
        assert!(!second.updated);
        assert_eq!(applier.applied.borrow().len(), 1);
    }

    #[test]
    fn test_modified_without_redundancy_skips_and_keeps_record() {
        let fx = Fixture::new();
        let path = fx.write_ordinary("001_init.sql", "CREATE TABLE realms (id INT);");
        let original = fingerprint_file(&path).unwrap();

        let repo = MemoryRepository::default();
        repo.seed("001_init.sql", "stale-fingerprint", RecordState::Active);
        let applier = RecordingApplier::default();

        let result = fx
            .fetcher(&repo, &applier)
            .update(&UpdateOptions {
                redundancy: false,
                ..UpdateOptions::default()
            })
            .expect("Update failed");

        assert!(!result.updated);
        assert!(applier.applied.borrow().is_empty());
        // Record untouched.
        assert_eq!(
            repo.fingerprint_of("001_init.sql").unwrap(),
            "stale-fingerprint"
        );
        assert_ne!(original, "stale-fingerprint");
    }

    #[test]
    fn test_modified_with_redundancy_reapplies_and_updates_fingerprint() {
        let fx = Fixture::new();
        let path = fx.write_ordinary("001_init.sql", "CREATE TABLE realms (id INT);");
        let current = fingerprint_file(&path).unwrap();

        let repo = MemoryRepository::default();
        repo.seed("001_init.sql", "stale-fingerprint", RecordState::Active);
        let applier = RecordingApplier::default();

        let result = fx
            .fetcher(&repo, &applier)
            .update(&UpdateOptions::default())
            .expect("Update failed");

        assert_eq!(result.recent, 1);
        assert!(result.updated);
        assert_eq!(repo.fingerprint_of("001_init.sql").unwrap(), current);
    }

    #[test]
    fn test_archived_modification_gated_separately() {
        let fx = Fixture::new();
        fx.write_archived("900_legacy.sql", "ALTER TABLE realms ADD flags INT;");

        let repo = MemoryRepository::default();
        repo.seed("900_legacy.sql", "stale-fingerprint", RecordState::Archived);
        let applier = RecordingApplier::default();

        // archived_redundancy defaults to off: skip even though redundancy is on.
        let result = fx
            .fetcher(&repo, &applier)
            .update(&UpdateOptions::default())
            .expect("Update failed");
        assert!(!result.updated);

        let result = fx
            .fetcher(&repo, &applier)
            .update(&UpdateOptions {
                archived_redundancy: true,
                ..UpdateOptions::default()
            })
            .expect("Update failed");
        assert_eq!(result.archived, 1);
        assert_eq!(result.recent, 0);
        assert!(result.updated);
    }

    #[test]
    fn test_new_archived_file_counts_as_archived() {
        let fx = Fixture::new();
        fx.write_archived("900_legacy.sql", "ALTER TABLE realms ADD flags INT;");

        let repo = MemoryRepository::default();
        let applier = RecordingApplier::default();

        let result = fx
            .fetcher(&repo, &applier)
            .update(&UpdateOptions::default())
            .expect("Update failed");

        assert_eq!(result.archived, 1);
        assert_eq!(result.recent, 0);
    }

    #[test]
    fn test_rehash_refreshes_empty_fingerprint_without_applying() {
        let fx = Fixture::new();
        let path = fx.write_archived("900_legacy.sql", "ALTER TABLE realms ADD flags INT;");
        let current = fingerprint_file(&path).unwrap();

        let repo = MemoryRepository::default();
        repo.seed("900_legacy.sql", "", RecordState::Archived);
        let applier = RecordingApplier::default();

        let result = fx
            .fetcher(&repo, &applier)
            .update(&UpdateOptions::default())
            .expect("Update failed");

        assert!(!result.updated);
        assert!(applier.applied.borrow().is_empty());
        assert_eq!(repo.fingerprint_of("900_legacy.sql").unwrap(), current);
    }

    #[test]
    fn test_state_flag_corrected_when_file_moves_to_archive() {
        let fx = Fixture::new();
        let path = fx.write_archived("001_init.sql", "CREATE TABLE realms (id INT);");
        let current = fingerprint_file(&path).unwrap();

        let repo = MemoryRepository::default();
        repo.seed("001_init.sql", &current, RecordState::Active);
        let applier = RecordingApplier::default();

        fx.fetcher(&repo, &applier)
            .update(&UpdateOptions::default())
            .expect("Update failed");

        assert!(applier.applied.borrow().is_empty());
        assert_eq!(
            repo.rows.borrow().get("001_init.sql").unwrap().state,
            RecordState::Archived
        );
    }

    #[test]
    fn test_dead_references_pruned_within_tolerance() {
        let fx = Fixture::new();
        fx.write_ordinary("001_init.sql", "CREATE TABLE realms (id INT);");

        let repo = MemoryRepository::default();
        let applier = RecordingApplier::default();
        let opts = UpdateOptions::default();

        fx.fetcher(&repo, &applier).update(&opts).expect("First run failed");
        repo.seed("002_gone.sql", "whatever", RecordState::Active);

        let result = fx
            .fetcher(&repo, &applier)
            .update(&opts)
            .expect("Second run failed");

        assert!(!result.updated);
        assert!(repo.fingerprint_of("002_gone.sql").is_none());
    }

    #[test]
    fn test_dead_reference_overflow_fails_without_pruning() {
        let fx = Fixture::new();
        fx.write_ordinary("001_init.sql", "CREATE TABLE realms (id INT);");

        let repo = MemoryRepository::default();
        repo.seed("002_gone.sql", "whatever", RecordState::Active);
        let applier = RecordingApplier::default();

        let err = fx
            .fetcher(&repo, &applier)
            .update(&UpdateOptions {
                clean_dead_ref_max_count: 0,
                ..UpdateOptions::default()
            })
            .unwrap_err();

        assert!(matches!(
            err,
            Error::DeadReferenceOverflow { count: 1, max: 0 }
        ));
        // Idempotent failure: the row is still there.
        assert!(repo.fingerprint_of("002_gone.sql").is_some());
    }

    #[test]
    fn test_negative_tolerance_disables_dead_reference_limit() {
        let fx = Fixture::new();
        fx.write_ordinary("001_init.sql", "CREATE TABLE realms (id INT);");

        let repo = MemoryRepository::default();
        for i in 0..10 {
            repo.seed(&format!("{i:03}_gone.sql"), "x", RecordState::Active);
        }
        let applier = RecordingApplier::default();

        fx.fetcher(&repo, &applier)
            .update(&UpdateOptions {
                clean_dead_ref_max_count: -1,
                ..UpdateOptions::default()
            })
            .expect("Unlimited prune should succeed");
        assert!(repo.rows.borrow().keys().all(|k| k == "001_init.sql"));
    }

    #[test]
    fn test_apply_failure_aborts_run_keeping_prior_records() {
        let fx = Fixture::new();
        fx.write_ordinary("001_init.sql", "CREATE TABLE realms (id INT);");
        fx.write_ordinary("002_bad.sql", "THIS IS NOT SQL;");

        let repo = MemoryRepository::default();
        let applier = RecordingApplier {
            fail_on: Some("002_bad.sql".to_string()),
            ..RecordingApplier::default()
        };

        let err = fx
            .fetcher(&repo, &applier)
            .update(&UpdateOptions::default())
            .unwrap_err();

        assert!(matches!(err, Error::ApplyFailed { .. }));
        // The first file stays recorded; no engine-level rollback.
        assert!(repo.fingerprint_of("001_init.sql").is_some());
        assert!(repo.fingerprint_of("002_bad.sql").is_none());
    }

    #[test]
    fn test_missing_source_tree_is_fatal() {
        let temp = tempfile::tempdir().expect("Failed to create temp dir");
        let conn = conn_info();
        let repo = MemoryRepository::default();
        let applier = RecordingApplier::default();

        let fetcher = UpdateFetcher::new(temp.path(), "auth", &conn, &repo, &applier);
        let err = fetcher.update(&UpdateOptions::default()).unwrap_err();
        assert!(matches!(err, Error::SourceTreeMissing(_)));
    }

    #[test]
    fn test_nested_directories_are_scanned() {
        let fx = Fixture::new();
        let nested = fx.temp.path().join("sql/updates/auth/2024_01");
        std::fs::create_dir_all(&nested).expect("Failed to create nested dir");
        std::fs::write(nested.join("001_init.sql"), "SELECT 1;").expect("write");
        // Non-SQL files are ignored.
        std::fs::write(nested.join("README.md"), "notes").expect("write");

        let repo = MemoryRepository::default();
        let applier = RecordingApplier::default();

        let result = fx
            .fetcher(&repo, &applier)
            .update(&UpdateOptions::default())
            .expect("Update failed");
        assert_eq!(result.recent, 1);
    }
}
