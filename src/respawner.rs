//! Build-once, reset-many orchestration.
//!
//! [`Respawner::create`] discovers the catalog through the configured
//! [`DbAdapter`], orders it with [`GraphBuilder`], and caches the rendered
//! delete (and optional reseed) script. [`Respawner::reset`] replays that
//! script in a transaction, suspending system versioning around it when
//! temporal tables were found.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::adapter::{DbAdapter, Engine, Scope};
use crate::db::{self, DbConnection, Row};
use crate::error::{RespawnError, Result};
use crate::graph::{GraphBuilder, Relationship, Table, TemporalTable};

/// Options controlling discovery and reset.
#[derive(Debug, Clone)]
pub struct RespawnerOptions {
    /// Which tables are reset.
    pub scope: Scope,
    /// Reset identity / auto-increment counters after the delete.
    pub with_reseed: bool,
    /// Look for system-versioned tables and suspend versioning during reset.
    pub check_temporal_tables: bool,
    /// Timeout forwarded to every command; `None` keeps the connection's own.
    pub command_timeout: Option<Duration>,
    /// SQL dialect of the target database.
    pub adapter: Arc<dyn DbAdapter>,
}

impl Default for RespawnerOptions {
    fn default() -> Self {
        Self {
            scope: Scope::default(),
            with_reseed: false,
            check_temporal_tables: false,
            command_timeout: None,
            adapter: Engine::Sqlite.adapter(),
        }
    }
}

/// A cached reset plan for one database.
///
/// Immutable once built; share it freely across connections to databases
/// with the same schema.
#[derive(Debug)]
pub struct Respawner {
    options: RespawnerOptions,
    graph: GraphBuilder,
    temporal_tables: Vec<TemporalTable>,
    delete_sql: String,
    reseed_sql: Option<String>,
}

impl Respawner {
    /// Build a plan by opening the SQLite database at `path`.
    ///
    /// Fails with [`RespawnError::ConfigurationMismatch`] before touching the
    /// file unless the options carry the SQLite adapter.
    pub fn create_from_path(path: impl AsRef<Path>, options: RespawnerOptions) -> Result<Self> {
        require_engine(&options, Engine::Sqlite)?;

        let mut conn = db::open_database(path).map_err(RespawnError::database)?;
        Self::create(&mut conn, options)
    }

    /// Build a plan by discovering the catalog over an open connection.
    pub fn create<C: DbConnection>(conn: &mut C, options: RespawnerOptions) -> Result<Self> {
        let adapter = Arc::clone(&options.adapter);
        let timeout = options.command_timeout;

        let tables = discover_tables(conn, adapter.as_ref(), &options.scope, timeout)?;
        if tables.is_empty() {
            return Err(RespawnError::EmptyScope);
        }

        let temporal_tables = if options.check_temporal_tables
            && supports_temporal_tables(conn, adapter.as_ref(), timeout)?
        {
            discover_temporal_tables(conn, adapter.as_ref(), &options.scope, timeout)?
        } else {
            Vec::new()
        };

        let relationships =
            discover_relationships(conn, adapter.as_ref(), &options.scope, &tables, timeout)?;

        let graph = GraphBuilder::new(&tables, &relationships);

        let delete_sql = adapter.build_delete_command_text(&graph);
        let reseed_sql = if options.with_reseed
            && supports_reseed(conn, adapter.as_ref(), timeout)?
        {
            Some(adapter.build_reseed_command_text(graph.to_delete()))
        } else {
            None
        };

        tracing::info!(
            engine = %adapter.engine(),
            tables = tables.len(),
            relationships = relationships.len(),
            cyclic = graph.cyclic_relationships().len(),
            temporal = temporal_tables.len(),
            reseed = reseed_sql.is_some(),
            "reset plan built"
        );

        Ok(Self {
            options,
            graph,
            temporal_tables,
            delete_sql,
            reseed_sql,
        })
    }

    /// Reset the SQLite database at `path`.
    pub fn reset_path(&self, path: impl AsRef<Path>) -> Result<()> {
        require_engine(&self.options, Engine::Sqlite)?;

        let mut conn = db::open_database(path).map_err(RespawnError::database)?;
        self.reset(&mut conn)
    }

    /// Delete every row (and reseed, if configured) over `conn`.
    ///
    /// The delete and reseed scripts share one transaction. When temporal
    /// tables were discovered, versioning is suspended in its own transaction
    /// beforehand and restored afterwards whatever the delete's outcome.
    pub fn reset<C: DbConnection>(&self, conn: &mut C) -> Result<()> {
        self.with_versioning_suspended(conn, |conn| self.execute_delete(conn))?;

        tracing::info!(tables = self.graph.to_delete().len(), "database reset");
        Ok(())
    }

    fn execute_delete<C: DbConnection>(&self, conn: &mut C) -> Result<()> {
        let mut scripts = vec![self.delete_sql.as_str()];
        if let Some(reseed) = &self.reseed_sql {
            scripts.push(reseed);
        }

        conn.execute_in_transaction(&scripts, self.options.command_timeout)
            .map_err(RespawnError::database)
    }

    /// Run `body` with system versioning off, turning it back on on every
    /// exit path.
    fn with_versioning_suspended<C, F>(&self, conn: &mut C, body: F) -> Result<()>
    where
        C: DbConnection,
        F: FnOnce(&mut C) -> Result<()>,
    {
        if self.temporal_tables.is_empty() {
            return body(conn);
        }

        let adapter = &self.options.adapter;
        let timeout = self.options.command_timeout;

        let off = adapter.build_turn_off_system_versioning_command_text(&self.temporal_tables);
        conn.execute_in_transaction(&[off.as_str()], timeout)
            .map_err(RespawnError::database)?;
        tracing::debug!(tables = self.temporal_tables.len(), "system versioning suspended");

        let outcome = body(&mut *conn);

        let on = adapter.build_turn_on_system_versioning_command_text(&self.temporal_tables);
        let restored = conn
            .execute_in_transaction(&[on.as_str()], timeout)
            .map_err(RespawnError::restore_versioning);

        match (outcome, restored) {
            (Ok(()), Ok(())) => {
                tracing::debug!("system versioning restored");
                Ok(())
            }
            (Err(err), Ok(())) => Err(err),
            (Ok(()), Err(restore)) => {
                tracing::error!(error = %restore, "system versioning left suspended");
                Err(restore)
            }
            (Err(reset), Err(restore)) => {
                tracing::error!(error = %restore, "system versioning left suspended");
                Err(RespawnError::ResetAndRestore {
                    reset: Box::new(reset),
                    restore: Box::new(restore),
                })
            }
        }
    }

    pub fn options(&self) -> &RespawnerOptions {
        &self.options
    }

    /// The cached delete script.
    pub fn delete_sql(&self) -> &str {
        &self.delete_sql
    }

    /// The cached reseed script, if reseeding was requested and the target
    /// has counters to reset.
    pub fn reseed_sql(&self) -> Option<&str> {
        self.reseed_sql.as_deref()
    }

    /// System-versioned tables discovered at build time.
    pub fn temporal_tables(&self) -> &[TemporalTable] {
        &self.temporal_tables
    }

    /// Tables in the order the delete script empties them.
    pub fn deletion_order(&self) -> &[Table] {
        self.graph.to_delete()
    }

    /// Foreign keys relaxed by the delete script to break cycles.
    pub fn cyclic_relationships(&self) -> &BTreeSet<Relationship> {
        self.graph.cyclic_relationships()
    }
}

fn require_engine(options: &RespawnerOptions, expected: Engine) -> Result<()> {
    let actual = options.adapter.engine();
    if actual != expected {
        return Err(RespawnError::ConfigurationMismatch { expected, actual });
    }
    Ok(())
}

fn query<C: DbConnection>(conn: &mut C, sql: &str, timeout: Option<Duration>) -> Result<Vec<Row>> {
    conn.query_rows(sql, timeout).map_err(RespawnError::database)
}

/// Cell `i` of `row`, with a missing column read as `NULL`.
fn cell(row: &Row, i: usize) -> Option<String> {
    row.get(i).cloned().flatten()
}

fn required(row: &Row, i: usize, query: &'static str) -> Result<String> {
    cell(row, i).ok_or_else(|| RespawnError::UnexpectedRow {
        query,
        row: row.clone(),
    })
}

fn discover_tables<C: DbConnection>(
    conn: &mut C,
    adapter: &dyn DbAdapter,
    scope: &Scope,
    timeout: Option<Duration>,
) -> Result<BTreeSet<Table>> {
    let rows = query(conn, &adapter.build_table_command_text(scope), timeout)?;

    let mut tables = BTreeSet::new();
    for row in &rows {
        let table = Table {
            schema: cell(row, 0),
            name: required(row, 1, "table")?,
        };
        let in_scope = if adapter.ignores_identifier_case() {
            scope.contains_ignore_case(&table)
        } else {
            scope.contains(&table)
        };
        if in_scope {
            tables.insert(table);
        }
    }

    tracing::debug!(tables = tables.len(), "tables discovered");
    Ok(tables)
}

/// Run a support query and read its single cell as a boolean.
fn probe<C: DbConnection>(conn: &mut C, sql: &str, timeout: Option<Duration>) -> Result<bool> {
    let rows = query(conn, sql, timeout)?;
    Ok(rows
        .first()
        .and_then(|row| cell(row, 0))
        .is_some_and(|value| {
            matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "t")
        }))
}

fn supports_temporal_tables<C: DbConnection>(
    conn: &mut C,
    adapter: &dyn DbAdapter,
    timeout: Option<Duration>,
) -> Result<bool> {
    let Some(sql) = adapter.build_temporal_support_command_text() else {
        return Ok(false);
    };

    let supported = probe(conn, &sql, timeout)?;
    tracing::debug!(supported, "temporal table support checked");
    Ok(supported)
}

fn supports_reseed<C: DbConnection>(
    conn: &mut C,
    adapter: &dyn DbAdapter,
    timeout: Option<Duration>,
) -> Result<bool> {
    let Some(sql) = adapter.build_reseed_support_command_text() else {
        return Ok(true);
    };

    let supported = probe(conn, &sql, timeout)?;
    if !supported {
        tracing::debug!("nothing to reseed, skipping reseed script");
    }
    Ok(supported)
}

fn discover_temporal_tables<C: DbConnection>(
    conn: &mut C,
    adapter: &dyn DbAdapter,
    scope: &Scope,
    timeout: Option<Duration>,
) -> Result<Vec<TemporalTable>> {
    let rows = query(conn, &adapter.build_temporal_table_command_text(scope), timeout)?;

    rows.iter()
        .map(|row| {
            Ok(TemporalTable {
                schema: cell(row, 0),
                name: required(row, 1, "temporal table")?,
                history_schema: required(row, 2, "temporal table")?,
                history_name: required(row, 3, "temporal table")?,
            })
        })
        .collect()
}

fn discover_relationships<C: DbConnection>(
    conn: &mut C,
    adapter: &dyn DbAdapter,
    scope: &Scope,
    tables: &BTreeSet<Table>,
    timeout: Option<Duration>,
) -> Result<BTreeSet<Relationship>> {
    let rows = query(conn, &adapter.build_relationship_command_text(scope), timeout)?;

    let mut relationships = BTreeSet::new();
    let mut dropped = 0usize;
    for row in &rows {
        let child = Table {
            schema: cell(row, 0),
            name: required(row, 1, "relationship")?,
        };
        let parent = Table {
            schema: cell(row, 2),
            name: required(row, 3, "relationship")?,
        };
        let name = required(row, 4, "relationship")?;

        if tables.contains(&parent) && tables.contains(&child) {
            relationships.insert(Relationship::new(parent, child, name));
        } else {
            dropped += 1;
        }
    }

    tracing::debug!(
        relationships = relationships.len(),
        dropped,
        "relationships discovered"
    );
    Ok(relationships)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn shop() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        conn.execute_batch(
            "CREATE TABLE Customers (Id INTEGER PRIMARY KEY);
             CREATE TABLE Orders (
                 Id INTEGER PRIMARY KEY,
                 CustomerId INTEGER NOT NULL REFERENCES Customers(Id)
             );
             INSERT INTO Customers VALUES (1);
             INSERT INTO Orders VALUES (10, 1);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn create_orders_children_first() {
        let mut conn = shop();

        let respawner = Respawner::create(&mut conn, RespawnerOptions::default()).unwrap();

        assert_eq!(
            respawner.deletion_order(),
            &[Table::unqualified("Orders"), Table::unqualified("Customers")]
        );
        assert_eq!(
            respawner.delete_sql(),
            "DELETE FROM \"Orders\";\nDELETE FROM \"Customers\";\n"
        );
        assert!(respawner.reseed_sql().is_none());
        assert!(respawner.temporal_tables().is_empty());
    }

    #[test]
    fn reset_empties_every_table() {
        let mut conn = shop();
        let respawner = Respawner::create(&mut conn, RespawnerOptions::default()).unwrap();

        respawner.reset(&mut conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM Orders) + (SELECT COUNT(*) FROM Customers)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn path_constructor_rejects_other_adapters() {
        let options = RespawnerOptions {
            adapter: Engine::SqlServer.adapter(),
            ..RespawnerOptions::default()
        };

        // The path does not exist; the mismatch must be reported before any I/O.
        let err = Respawner::create_from_path("/nonexistent/respawn.db", options).unwrap_err();

        assert!(matches!(
            err,
            RespawnError::ConfigurationMismatch {
                expected: Engine::Sqlite,
                actual: Engine::SqlServer,
            }
        ));
    }

    #[test]
    fn respawner_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Respawner>();
    }
}
