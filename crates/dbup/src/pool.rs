//! Subprocess-backed connection pool.
//!
//! Bookkeeping queries run through the same external client binary that
//! applies migration files, in batch mode (`-N -B -e`), so the tool needs no
//! database driver. Rows come back tab-separated on stdout. The password is
//! passed via the `MYSQL_PWD` environment variable, never the argument
//! vector.

use dbup_core::process::connection_args;
use dbup_core::{ClientLocator, ConnectionInfo, DatabasePool, Error};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

pub struct ClientPool {
    client: PathBuf,
    info: ConnectionInfo,
}

impl ClientPool {
    /// Bind a pool to one database's connection settings.
    pub fn new(locator: &ClientLocator, info: ConnectionInfo) -> dbup_core::Result<Self> {
        Ok(Self {
            client: locator.ensure()?,
            info,
        })
    }

    fn run(&self, sql: &str, with_database: bool) -> dbup_core::Result<String> {
        let mut args = connection_args(&self.info);
        args.push("-N".to_string());
        args.push("-B".to_string());
        args.push("-e".to_string());
        args.push(sql.to_string());
        if with_database && !self.info.database.is_empty() {
            args.push(self.info.database.clone());
        }

        debug!("client batch statement against '{}'", self.info.database);

        let mut command = Command::new(&self.client);
        command.args(&args).stdin(Stdio::null());
        if !self.info.password.is_empty() {
            command.env("MYSQL_PWD", &self.info.password);
        }

        let output = command.output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Pool(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Whether the configured schema exists on the server at all.
    pub fn database_exists(&self) -> dbup_core::Result<bool> {
        let sql = format!(
            "SELECT SCHEMA_NAME FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = '{}'",
            self.info.database.replace('\'', "''")
        );
        // Run without selecting the database; it may not exist yet.
        let stdout = self.run(&sql, false)?;
        Ok(!parse_rows(&stdout).is_empty())
    }
}

/// Split batch-mode stdout into rows of cells.
fn parse_rows(stdout: &str) -> Vec<Vec<String>> {
    stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}

impl DatabasePool for ClientPool {
    fn query(&self, sql: &str) -> dbup_core::Result<Vec<Vec<String>>> {
        let stdout = self.run(sql, true)?;
        Ok(parse_rows(&stdout))
    }

    fn execute(&self, sql: &str) -> dbup_core::Result<()> {
        self.run(sql, true).map(|_| ())
    }

    fn connection_info(&self) -> &ConnectionInfo {
        &self.info
    }
}
