//! MySQL / MariaDB adapter.
//!
//! Without an include list, discovery is limited to the connection's current
//! database. Cycles are handled by switching `FOREIGN_KEY_CHECKS` off for the
//! session while the deletes run.

use super::{quote_identifier, scope_predicate, script, DbAdapter, Engine, Scope};
use crate::graph::{GraphBuilder, Table};

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlAdapter;

fn quote(ident: &str) -> String {
    quote_identifier(ident, '`', '`')
}

fn quote_table(table: &Table) -> String {
    match &table.schema {
        Some(schema) => format!("{}.{}", quote(schema), quote(&table.name)),
        None => quote(&table.name),
    }
}

fn current_database_filter(scope: &Scope, column: &str) -> String {
    if scope.schemas_to_include.is_empty() {
        format!("AND {column} = DATABASE()")
    } else {
        String::new()
    }
}

impl DbAdapter for MySqlAdapter {
    fn engine(&self) -> Engine {
        Engine::MySql
    }

    fn build_table_command_text(&self, scope: &Scope) -> String {
        format!(
            "SELECT TABLE_SCHEMA, TABLE_NAME\n\
             FROM INFORMATION_SCHEMA.TABLES\n\
             WHERE TABLE_TYPE = 'BASE TABLE'\n\
             {}\n\
             {}",
            current_database_filter(scope, "TABLE_SCHEMA"),
            scope_predicate(scope, Some("TABLE_SCHEMA"), "TABLE_NAME")
        )
        .trim_end()
        .to_string()
    }

    fn build_relationship_command_text(&self, scope: &Scope) -> String {
        format!(
            "SELECT CONSTRAINT_SCHEMA, TABLE_NAME, UNIQUE_CONSTRAINT_SCHEMA, REFERENCED_TABLE_NAME, CONSTRAINT_NAME\n\
             FROM INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS\n\
             WHERE 1 = 1\n\
             {}\n\
             {}\n\
             {}",
            current_database_filter(scope, "CONSTRAINT_SCHEMA"),
            scope_predicate(scope, Some("CONSTRAINT_SCHEMA"), "TABLE_NAME"),
            scope_predicate(scope, Some("UNIQUE_CONSTRAINT_SCHEMA"), "REFERENCED_TABLE_NAME")
        )
        .trim_end()
        .to_string()
    }

    fn build_delete_command_text(&self, graph: &GraphBuilder) -> String {
        let mut lines = Vec::with_capacity(graph.to_delete().len() + 2);

        if graph.has_cycles() {
            lines.push("SET FOREIGN_KEY_CHECKS = 0;".to_string());
        }
        lines.extend(
            graph
                .to_delete()
                .iter()
                .map(|table| format!("DELETE FROM {};", quote_table(table))),
        );
        if graph.has_cycles() {
            lines.push("SET FOREIGN_KEY_CHECKS = 1;".to_string());
        }

        script(lines)
    }

    // ALTER TABLE commits implicitly in MySQL, so the reseed is not rolled
    // back with the deletes if it fails.
    fn build_reseed_command_text(&self, tables: &[Table]) -> String {
        script(
            tables
                .iter()
                .map(|table| format!("ALTER TABLE {} AUTO_INCREMENT = 1;", quote_table(table)))
                .collect(),
        )
    }
}
