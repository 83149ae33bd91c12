//! Connection seam.
//!
//! [`DbConnection`] is everything the respawner needs from a live connection:
//! run a metadata query and run scripts inside a transaction. It is
//! implemented here for [`rusqlite::Connection`]; drivers for other engines
//! implement it in the caller's crate.

use std::path::Path;
use std::time::Duration;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

/// Busy timeout applied to connections opened by [`open_database`].
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One result row, every cell rendered as text. `NULL` is `None`.
pub type Row = Vec<Option<String>>;

/// A live connection the respawner can query and execute through.
///
/// Implementations must not multiplex transactions; the `&mut self` receivers
/// serialize resets on one connection.
pub trait DbConnection {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Run `sql` and return every row.
    fn query_rows(&mut self, sql: &str, timeout: Option<Duration>) -> Result<Vec<Row>, Self::Error>;

    /// Run `scripts` in order inside one transaction and commit.
    ///
    /// Any failure rolls the whole transaction back.
    fn execute_in_transaction(
        &mut self,
        scripts: &[&str],
        timeout: Option<Duration>,
    ) -> Result<(), Self::Error>;
}

impl DbConnection for Connection {
    type Error = rusqlite::Error;

    fn query_rows(&mut self, sql: &str, timeout: Option<Duration>) -> rusqlite::Result<Vec<Row>> {
        if let Some(timeout) = timeout {
            self.busy_timeout(timeout)?;
        }

        let mut stmt = self.prepare(sql)?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(cell_to_string))
                    .collect::<rusqlite::Result<Row>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    fn execute_in_transaction(
        &mut self,
        scripts: &[&str],
        timeout: Option<Duration>,
    ) -> rusqlite::Result<()> {
        if let Some(timeout) = timeout {
            self.busy_timeout(timeout)?;
        }

        let tx = self.transaction()?;
        for script in scripts {
            tx.execute_batch(script)?;
        }
        tx.commit()?;

        tracing::debug!(scripts = scripts.len(), "transaction committed");
        Ok(())
    }
}

fn cell_to_string(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Open an existing SQLite database with foreign keys enforced.
///
/// Unlike `Connection::open`, a missing file is an error rather than a new
/// empty database.
pub fn open_database(path: impl AsRef<Path>) -> rusqlite::Result<Connection> {
    let path = path.as_ref();

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;

    tracing::debug!(path = %path.display(), "database opened");
    Ok(conn)
}
