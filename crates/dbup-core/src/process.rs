//! Subprocess application of SQL scripts through the external client.
//!
//! Each script is wrapped in `BEGIN; SOURCE <file>; COMMIT;` and handed to an
//! isolated client process with stdout/stderr suppressed. The password goes
//! through the `MYSQL_PWD` environment variable, never the argument vector,
//! so it cannot be read from a process listing or leak into logs. Only the
//! exit status is reported.
//!
//! Caveat: the transaction wrapper is only as strong as the engine's
//! transactional DDL support. A non-zero exit means the wrapping transaction
//! did not commit, but individual DDL statements may have auto-committed.

use crate::error::{Error, Result};
use crate::locator::ClientLocator;
use crate::pool::ConnectionInfo;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Connection flags shared by every client invocation (no password, no `-e`).
pub fn connection_args(conn: &ConnectionInfo) -> Vec<String> {
    let mut args = Vec::with_capacity(8);

    args.push(format!("-h{}", conn.host));
    args.push(format!("-u{}", conn.user));

    // TCP port or named socket, decided by whether the value is numeric.
    #[cfg(windows)]
    {
        if conn.host == "." {
            args.push("--protocol=PIPE".to_string());
        } else {
            args.push(format!("-P{}", conn.port_or_socket));
        }
    }

    #[cfg(not(windows))]
    {
        let numeric = conn
            .port_or_socket
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit());
        if numeric {
            args.push(format!("-P{}", conn.port_or_socket));
        } else {
            // Host may read "localhost" when the socket option is enabled,
            // so the socket path alone decides the protocol.
            args.push("-P0".to_string());
            args.push("--protocol=SOCKET".to_string());
            args.push(format!("-S{}", conn.port_or_socket));
        }
    }

    args.push("--default-character-set=utf8mb4".to_string());
    args.push("--max-allowed-packet=1GB".to_string());

    #[cfg(feature = "modern-client")]
    {
        if conn.tls {
            args.push("--ssl-mode=REQUIRED".to_string());
        }
        // Client-side commands are disabled by default since 9.4; SOURCE
        // needs them back on.
        args.push("--commands=ON".to_string());
    }

    #[cfg(not(feature = "modern-client"))]
    {
        if conn.tls {
            args.push("--ssl".to_string());
        }
    }

    args
}

fn script_args(conn: &ConnectionInfo, database: &str, script: &Path) -> Vec<String> {
    let mut args = connection_args(conn);

    args.push("-e".to_string());
    args.push(format!("BEGIN; SOURCE {}; COMMIT;", script.display()));

    if !database.is_empty() {
        args.push(database.to_string());
    }

    args
}

/// Run one SQL script file through the client, returning only success/failure.
pub fn apply_file(
    client: &Path,
    conn: &ConnectionInfo,
    database: &str,
    script: &Path,
) -> Result<()> {
    let args = script_args(conn, database, script);

    debug!(
        "Applying '{}' to '{}' via {}",
        script.display(),
        if database.is_empty() { "<server>" } else { database },
        client.display()
    );

    let mut command = Command::new(client);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    if !conn.password.is_empty() {
        command.env("MYSQL_PWD", &conn.password);
    }

    let status = command.status()?;
    if status.success() {
        Ok(())
    } else {
        Err(Error::apply_failed(
            script.display().to_string(),
            database,
            status.code().unwrap_or(-1),
        ))
    }
}

/// Seam for applying a script against a connection.
///
/// Production uses [`ClientApplier`]; tests substitute a recording fake so no
/// real client process is ever spawned.
pub trait SqlApplier {
    fn apply_file(&self, conn: &ConnectionInfo, database: &str, script: &Path) -> Result<()>;
}

/// Applies scripts through the located external client binary.
pub struct ClientApplier<'a> {
    locator: &'a ClientLocator,
}

impl<'a> ClientApplier<'a> {
    pub fn new(locator: &'a ClientLocator) -> Self {
        Self { locator }
    }
}

impl SqlApplier for ClientApplier<'_> {
    fn apply_file(&self, conn: &ConnectionInfo, database: &str, script: &Path) -> Result<()> {
        let client = self.locator.ensure()?;
        apply_file(&client, conn, database, script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(port_or_socket: &str, tls: bool) -> ConnectionInfo {
        ConnectionInfo {
            host: "127.0.0.1".to_string(),
            user: "root".to_string(),
            password: "secret".to_string(),
            port_or_socket: port_or_socket.to_string(),
            database: "auth".to_string(),
            tls,
        }
    }

    #[test]
    fn test_tcp_port_args() {
        let args = connection_args(&info("3306", false));
        assert!(args.contains(&"-h127.0.0.1".to_string()));
        assert!(args.contains(&"-uroot".to_string()));
        assert!(args.contains(&"-P3306".to_string()));
        assert!(args.contains(&"--default-character-set=utf8mb4".to_string()));
        assert!(args.contains(&"--max-allowed-packet=1GB".to_string()));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_socket_args() {
        let args = connection_args(&info("/var/run/mysqld/mysqld.sock", false));
        assert!(args.contains(&"-P0".to_string()));
        assert!(args.contains(&"--protocol=SOCKET".to_string()));
        assert!(args.contains(&"-S/var/run/mysqld/mysqld.sock".to_string()));
    }

    #[test]
    fn test_password_never_in_args() {
        let args = script_args(&info("3306", false), "auth", Path::new("/tmp/001.sql"));
        assert!(args.iter().all(|a| !a.contains("secret")));
    }

    #[cfg(feature = "modern-client")]
    #[test]
    fn test_modern_tls_flag() {
        let args = connection_args(&info("3306", true));
        assert!(args.contains(&"--ssl-mode=REQUIRED".to_string()));
        assert!(args.contains(&"--commands=ON".to_string()));
    }

    #[cfg(not(feature = "modern-client"))]
    #[test]
    fn test_legacy_tls_flag() {
        let args = connection_args(&info("3306", true));
        assert!(args.contains(&"--ssl".to_string()));
    }

    #[test]
    fn test_script_args_wrap_in_transaction() {
        let args = script_args(&info("3306", false), "auth", Path::new("/tmp/001.sql"));
        let e_pos = args.iter().position(|a| a == "-e").expect("-e flag missing");
        assert_eq!(args[e_pos + 1], "BEGIN; SOURCE /tmp/001.sql; COMMIT;");
        assert_eq!(args.last().unwrap(), "auth");
    }

    #[test]
    fn test_script_args_omit_empty_database() {
        let args = script_args(&info("3306", false), "", Path::new("/tmp/create.sql"));
        assert!(args.last().unwrap().starts_with("BEGIN;"));
    }
}
