//! Bookkeeping for previously applied migrations.
//!
//! One row per applied migration lives in an `updates` table inside the
//! target database itself. The SQL implementation talks through the borrowed
//! pool; tests substitute an in-memory repository.

use crate::error::Result;
use crate::pool::DatabasePool;
use std::fmt;

/// State flag of a bookkeeping row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Active,
    Archived,
}

impl RecordState {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordState::Active => "ACTIVE",
            RecordState::Archived => "ARCHIVED",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "ARCHIVED" => RecordState::Archived,
            _ => RecordState::Active,
        }
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One previously applied migration, keyed by name.
///
/// The fingerprint reflects the content that was last successfully applied.
#[derive(Debug, Clone)]
pub struct AppliedRecord {
    pub name: String,
    pub fingerprint: String,
    pub state: RecordState,
}

/// Persistence seam for the applied-set.
pub trait UpdateRepository {
    /// Create the bookkeeping table when it is missing.
    fn ensure_schema(&self) -> Result<()>;

    /// Load every applied record for this database.
    fn applied(&self) -> Result<Vec<AppliedRecord>>;

    /// Insert or overwrite a record after a successful application.
    fn upsert(&self, record: &AppliedRecord, speed_ms: u64) -> Result<()>;

    /// Flip a record's state flag in place.
    fn set_state(&self, name: &str, state: RecordState) -> Result<()>;

    /// Refresh a record's fingerprint without re-applying (bookkeeping only).
    fn set_fingerprint(&self, name: &str, fingerprint: &str) -> Result<()>;

    /// Delete a dead record.
    fn remove(&self, name: &str) -> Result<()>;
}

/// The persisted bookkeeping format other tooling may read.
const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS `updates` (\
    `name` VARCHAR(200) NOT NULL, \
    `hash` CHAR(64) NOT NULL DEFAULT '', \
    `state` ENUM('ACTIVE','ARCHIVED') NOT NULL DEFAULT 'ACTIVE', \
    `timestamp` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP, \
    `speed` INT UNSIGNED NOT NULL DEFAULT 0, \
    PRIMARY KEY (`name`))";

/// `UpdateRepository` over the target database's borrowed pool.
pub struct SqlUpdateRepository<'a> {
    pool: &'a dyn DatabasePool,
}

impl<'a> SqlUpdateRepository<'a> {
    pub fn new(pool: &'a dyn DatabasePool) -> Self {
        Self { pool }
    }
}

/// Single-quote a value for inline SQL, doubling embedded quotes.
fn quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl UpdateRepository for SqlUpdateRepository<'_> {
    fn ensure_schema(&self) -> Result<()> {
        self.pool.execute(SCHEMA_SQL)
    }

    fn applied(&self) -> Result<Vec<AppliedRecord>> {
        let rows = self
            .pool
            .query("SELECT `name`, `hash`, `state` FROM `updates` ORDER BY `name` ASC")?;

        Ok(rows
            .into_iter()
            .filter(|row| !row.is_empty())
            .map(|row| AppliedRecord {
                name: row[0].clone(),
                fingerprint: row.get(1).cloned().unwrap_or_default(),
                state: RecordState::from_str(row.get(2).map(String::as_str).unwrap_or("ACTIVE")),
            })
            .collect())
    }

    fn upsert(&self, record: &AppliedRecord, speed_ms: u64) -> Result<()> {
        self.pool.execute(&format!(
            "REPLACE INTO `updates` (`name`, `hash`, `state`, `timestamp`, `speed`) \
             VALUES ({}, {}, {}, NOW(), {})",
            quoted(&record.name),
            quoted(&record.fingerprint),
            quoted(record.state.as_str()),
            speed_ms
        ))
    }

    fn set_state(&self, name: &str, state: RecordState) -> Result<()> {
        self.pool.execute(&format!(
            "UPDATE `updates` SET `state` = {} WHERE `name` = {}",
            quoted(state.as_str()),
            quoted(name)
        ))
    }

    fn set_fingerprint(&self, name: &str, fingerprint: &str) -> Result<()> {
        self.pool.execute(&format!(
            "UPDATE `updates` SET `hash` = {} WHERE `name` = {}",
            quoted(fingerprint),
            quoted(name)
        ))
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.pool
            .execute(&format!("DELETE FROM `updates` WHERE `name` = {}", quoted(name)))
    }
}
