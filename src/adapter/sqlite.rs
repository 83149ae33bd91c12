//! SQLite adapter.
//!
//! SQLite has no schemas, so tables come back with a `NULL` schema and schema
//! filters are ignored. Foreign keys are read through
//! `pragma_foreign_key_list`; cycles are handled by deferring foreign key
//! checks to commit, when every table is already empty.
//!
//! Reseeding clears `sqlite_sequence`, which only exists once a table declared
//! with `AUTOINCREMENT` has been created; without it no reseed is rendered.
//! Plain rowid tables restart on their own after the delete.
//!
//! Table names compare case-insensitively, as SQLite resolves them.

use super::{literal, quote_identifier, scope_predicate, script, DbAdapter, Engine, Scope};
use crate::graph::{GraphBuilder, Table};

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteAdapter;

fn quote(ident: &str) -> String {
    quote_identifier(ident, '"', '"')
}

fn quote_table(table: &Table) -> String {
    match &table.schema {
        Some(schema) => format!("{}.{}", quote(schema), quote(&table.name)),
        None => quote(&table.name),
    }
}

impl DbAdapter for SqliteAdapter {
    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    fn build_table_command_text(&self, scope: &Scope) -> String {
        format!(
            "SELECT NULL, m.name\n\
             FROM sqlite_master m\n\
             WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite\\_%' ESCAPE '\\'\n\
             {}",
            scope_predicate(scope, None, "m.name COLLATE NOCASE")
        )
        .trim_end()
        .to_string()
    }

    fn build_relationship_command_text(&self, scope: &Scope) -> String {
        // The referenced name is written as declared; resolve it against
        // sqlite_master so the parent matches the discovered table's casing.
        format!(
            "SELECT NULL, m.name, NULL, p.name, m.name || '_' || p.name || '_fk' || f.id\n\
             FROM sqlite_master m\n\
             INNER JOIN pragma_foreign_key_list(m.name) f\n\
             INNER JOIN sqlite_master p ON p.type = 'table' AND p.name = f.\"table\" COLLATE NOCASE\n\
             WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite\\_%' ESCAPE '\\'\n\
             {}\n\
             {}",
            scope_predicate(scope, None, "m.name COLLATE NOCASE"),
            scope_predicate(scope, None, "p.name COLLATE NOCASE")
        )
        .trim_end()
        .to_string()
    }

    fn build_delete_command_text(&self, graph: &GraphBuilder) -> String {
        let mut lines = Vec::with_capacity(graph.to_delete().len() + 1);

        if graph.has_cycles() {
            lines.push("PRAGMA defer_foreign_keys = ON;".to_string());
        }
        lines.extend(
            graph
                .to_delete()
                .iter()
                .map(|table| format!("DELETE FROM {};", quote_table(table))),
        );

        script(lines)
    }

    fn build_reseed_support_command_text(&self) -> Option<String> {
        Some(
            "SELECT COUNT(*)\n\
             FROM sqlite_master\n\
             WHERE type = 'table' AND name = 'sqlite_sequence'"
                .to_string(),
        )
    }

    fn build_reseed_command_text(&self, tables: &[Table]) -> String {
        let names = tables
            .iter()
            .map(|table| literal(&table.name))
            .collect::<Vec<_>>()
            .join(", ");
        format!("DELETE FROM sqlite_sequence WHERE name IN ({names});\n")
    }

    fn ignores_identifier_case(&self) -> bool {
        true
    }
}
