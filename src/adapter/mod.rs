//! Engine adapters.
//!
//! Provides the [`DbAdapter`] trait, one implementation per supported engine,
//! and the [`Scope`] filter every metadata query is rendered against. The
//! adapter for an engine is created via [`Engine::adapter`].
//!
//! Adapters only produce SQL text. Running it is the job of
//! [`crate::respawner::Respawner`] through a [`crate::db::DbConnection`].

pub mod mysql;
pub mod postgres;
pub mod sqlite;
pub mod sqlserver;

use std::sync::Arc;

use serde::Serialize;

use crate::graph::{GraphBuilder, Table, TemporalTable};

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    SqlServer,
    Postgres,
    MySql,
    Sqlite,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlServer => "sqlserver",
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// The adapter rendering SQL for this engine.
    pub fn adapter(&self) -> Arc<dyn DbAdapter> {
        match self {
            Self::SqlServer => Arc::new(sqlserver::SqlServerAdapter),
            Self::Postgres => Arc::new(postgres::PostgresAdapter),
            Self::MySql => Arc::new(mysql::MySqlAdapter),
            Self::Sqlite => Arc::new(sqlite::SqliteAdapter),
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlserver" | "mssql" => Ok(Self::SqlServer),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(format!(
                "unknown database adapter: {s}. Supported: sqlserver, postgres, mysql, sqlite"
            )),
        }
    }
}

/// Which tables a reset touches.
///
/// Empty include lists place no restriction. A table filter without a schema
/// matches that name in every schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub schemas_to_include: Vec<String>,
    pub schemas_to_exclude: Vec<String>,
    pub tables_to_ignore: Vec<Table>,
    pub tables_to_include: Vec<Table>,
}

impl Scope {
    /// Whether `table` passes every filter.
    pub fn contains(&self, table: &Table) -> bool {
        self.admits(table, false)
    }

    /// Like [`Scope::contains`], comparing names without regard to ASCII case.
    pub fn contains_ignore_case(&self, table: &Table) -> bool {
        self.admits(table, true)
    }

    fn admits(&self, table: &Table, ignore_case: bool) -> bool {
        let same = |a: &str, b: &str| {
            if ignore_case {
                a.eq_ignore_ascii_case(b)
            } else {
                a == b
            }
        };
        let matches = |filter: &Table| {
            if ignore_case {
                filter.matches_ignore_case(table)
            } else {
                filter.matches(table)
            }
        };

        let schema_ok = match table.schema.as_deref() {
            Some(schema) => {
                (self.schemas_to_include.is_empty()
                    || self.schemas_to_include.iter().any(|s| same(s.as_str(), schema)))
                    && !self.schemas_to_exclude.iter().any(|s| same(s.as_str(), schema))
            }
            None => true,
        };

        schema_ok
            && !self.tables_to_ignore.iter().any(|f| matches(f))
            && (self.tables_to_include.is_empty()
                || self.tables_to_include.iter().any(|f| matches(f)))
    }
}

/// SQL synthesis for one database engine.
///
/// Metadata queries must return their columns in the documented order;
/// nullable schema columns come back as `NULL` on schema-less engines.
pub trait DbAdapter: std::fmt::Debug + Send + Sync {
    /// The engine this adapter renders for.
    fn engine(&self) -> Engine;

    /// Query returning `(schema, table)` for every table in scope.
    fn build_table_command_text(&self, scope: &Scope) -> String;

    /// Query returning `(child schema, child table, parent schema, parent table,
    /// constraint name)` for every foreign key in scope.
    fn build_relationship_command_text(&self, scope: &Scope) -> String;

    /// Query returning a single truthy value when the target supports
    /// system-versioned tables, or `None` if the engine never does.
    fn build_temporal_support_command_text(&self) -> Option<String> {
        None
    }

    /// Query returning `(schema, table, history schema, history table)` for
    /// every system-versioned table in scope.
    ///
    /// Only called when the support query came back truthy.
    fn build_temporal_table_command_text(&self, _scope: &Scope) -> String {
        String::new()
    }

    /// Script deleting every row of every table, in [`GraphBuilder::to_delete`]
    /// order, relaxing the constraints in
    /// [`GraphBuilder::cyclic_relationships`].
    fn build_delete_command_text(&self, graph: &GraphBuilder) -> String;

    /// Query returning a single truthy value when the reseed script can run
    /// against the target, or `None` if it always can.
    fn build_reseed_support_command_text(&self) -> Option<String> {
        None
    }

    /// Script resetting identity / auto-increment counters of `tables`.
    fn build_reseed_command_text(&self, tables: &[Table]) -> String;

    /// Whether table names compare without regard to ASCII case.
    fn ignores_identifier_case(&self) -> bool {
        false
    }

    fn build_turn_off_system_versioning_command_text(&self, _tables: &[TemporalTable]) -> String {
        String::new()
    }

    fn build_turn_on_system_versioning_command_text(&self, _tables: &[TemporalTable]) -> String {
        String::new()
    }
}

/// Quote an identifier, doubling any embedded closing quote.
pub(crate) fn quote_identifier(ident: &str, open: char, close: char) -> String {
    let mut quoted = String::with_capacity(ident.len() + 2);
    quoted.push(open);
    for c in ident.chars() {
        if c == close {
            quoted.push(close);
        }
        quoted.push(c);
    }
    quoted.push(close);
    quoted
}

/// Render a single-quoted string literal.
pub(crate) fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn literal_list<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    values.into_iter().map(literal).collect::<Vec<_>>().join(", ")
}

/// Render `scope` as `AND ...` lines over the given columns.
///
/// `schema_column` is `None` for schema-less engines, in which case schema
/// filters are skipped and qualified table filters match on name alone.
pub(crate) fn scope_predicate(
    scope: &Scope,
    schema_column: Option<&str>,
    table_column: &str,
) -> String {
    let mut clauses = Vec::new();

    if let Some(schema_column) = schema_column {
        if !scope.schemas_to_include.is_empty() {
            clauses.push(format!(
                "AND {schema_column} IN ({})",
                literal_list(scope.schemas_to_include.iter().map(String::as_str))
            ));
        }
        if !scope.schemas_to_exclude.is_empty() {
            clauses.push(format!(
                "AND {schema_column} NOT IN ({})",
                literal_list(scope.schemas_to_exclude.iter().map(String::as_str))
            ));
        }
    }

    for table in &scope.tables_to_ignore {
        clauses.push(format!(
            "AND NOT ({})",
            table_match(table, schema_column, table_column)
        ));
    }

    if !scope.tables_to_include.is_empty() {
        let any = scope
            .tables_to_include
            .iter()
            .map(|table| table_match(table, schema_column, table_column))
            .collect::<Vec<_>>()
            .join(" OR ");
        clauses.push(format!("AND ({any})"));
    }

    clauses.join("\n")
}

fn table_match(table: &Table, schema_column: Option<&str>, table_column: &str) -> String {
    match (table.schema.as_deref(), schema_column) {
        (Some(schema), Some(schema_column)) => format!(
            "{schema_column} = {} AND {table_column} = {}",
            literal(schema),
            literal(&table.name)
        ),
        _ => format!("{table_column} = {}", literal(&table.name)),
    }
}

/// Join `lines` into a script, one statement per line.
pub(crate) fn script(lines: Vec<String>) -> String {
    let mut text = lines.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    text
}
