//! Connection pool collaborator interface.
//!
//! The engine never owns a database connection. Bookkeeping rows live in the
//! target database itself and are read/written through a pool borrowed from
//! the caller, one statement at a time.

use crate::error::Result;

/// Read-only connection attributes exposed by the pool.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub host: String,
    pub user: String,
    pub password: String,
    /// Numeric values mean a TCP port; anything else is a named socket path.
    pub port_or_socket: String,
    pub database: String,
    pub tls: bool,
}

/// Borrowed query/execute surface of the externally owned connection pool.
///
/// Rows come back as stringly-typed cells; the bookkeeping table only holds
/// names, hex fingerprints and small integers, so nothing richer is needed.
pub trait DatabasePool {
    /// Run a query and collect all result rows.
    fn query(&self, sql: &str) -> Result<Vec<Vec<String>>>;

    /// Execute a statement, discarding any result.
    fn execute(&self, sql: &str) -> Result<()>;

    /// Connection attributes for the database this pool is bound to.
    fn connection_info(&self) -> &ConnectionInfo;
}
