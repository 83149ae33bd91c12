//! PostgreSQL adapter.
//!
//! Foreign keys come from `pg_constraint`. The delete-side check of a foreign
//! key is a trigger on the referenced table, so every table referenced by a
//! cyclic foreign key gets `DISABLE TRIGGER ALL` for the duration of the
//! deletes. That requires ownership of those tables.

use std::collections::BTreeSet;

use super::{literal, quote_identifier, scope_predicate, script, DbAdapter, Engine, Scope};
use crate::graph::{GraphBuilder, Table};

/// Schemas skipped when no include list is configured.
const SYSTEM_SCHEMAS: &str = "'pg_catalog', 'information_schema'";

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresAdapter;

fn quote(ident: &str) -> String {
    quote_identifier(ident, '"', '"')
}

fn quote_table(table: &Table) -> String {
    match &table.schema {
        Some(schema) => format!("{}.{}", quote(schema), quote(&table.name)),
        None => quote(&table.name),
    }
}

fn system_schema_filter(scope: &Scope, column: &str) -> String {
    if scope.schemas_to_include.is_empty() {
        format!("AND {column} NOT IN ({SYSTEM_SCHEMAS})")
    } else {
        String::new()
    }
}

impl DbAdapter for PostgresAdapter {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    fn build_table_command_text(&self, scope: &Scope) -> String {
        format!(
            "SELECT table_schema, table_name\n\
             FROM information_schema.tables\n\
             WHERE table_type = 'BASE TABLE'\n\
             {}\n\
             {}",
            system_schema_filter(scope, "table_schema"),
            scope_predicate(scope, Some("table_schema"), "table_name")
        )
        .trim_end()
        .to_string()
    }

    fn build_relationship_command_text(&self, scope: &Scope) -> String {
        format!(
            "SELECT fk_ns.nspname, fk_table.relname, pk_ns.nspname, pk_table.relname, con.conname\n\
             FROM pg_catalog.pg_constraint con\n\
             INNER JOIN pg_catalog.pg_class fk_table ON con.conrelid = fk_table.oid\n\
             INNER JOIN pg_catalog.pg_namespace fk_ns ON fk_table.relnamespace = fk_ns.oid\n\
             INNER JOIN pg_catalog.pg_class pk_table ON con.confrelid = pk_table.oid\n\
             INNER JOIN pg_catalog.pg_namespace pk_ns ON pk_table.relnamespace = pk_ns.oid\n\
             WHERE con.contype = 'f'\n\
             {}\n\
             {}\n\
             {}",
            system_schema_filter(scope, "fk_ns.nspname"),
            scope_predicate(scope, Some("fk_ns.nspname"), "fk_table.relname"),
            scope_predicate(scope, Some("pk_ns.nspname"), "pk_table.relname")
        )
        .trim_end()
        .to_string()
    }

    fn build_delete_command_text(&self, graph: &GraphBuilder) -> String {
        let holders: BTreeSet<&Table> = graph
            .cyclic_relationships()
            .iter()
            .map(|rel| &rel.parent)
            .collect();

        let mut lines: Vec<String> = holders
            .iter()
            .map(|table| format!("ALTER TABLE {} DISABLE TRIGGER ALL;", quote_table(table)))
            .collect();

        lines.extend(
            graph
                .to_delete()
                .iter()
                .map(|table| format!("DELETE FROM {};", quote_table(table))),
        );

        lines.extend(
            holders
                .iter()
                .map(|table| format!("ALTER TABLE {} ENABLE TRIGGER ALL;", quote_table(table))),
        );

        script(lines)
    }

    fn build_reseed_command_text(&self, tables: &[Table]) -> String {
        let targets = tables
            .iter()
            .map(|table| {
                format!(
                    "({}, {})",
                    literal(table.schema.as_deref().unwrap_or("public")),
                    literal(&table.name)
                )
            })
            .collect::<Vec<_>>()
            .join(", ");

        // Restart every sequence owned by a column of the target tables,
        // covering both serial and identity columns.
        format!(
            "DO $$\n\
             DECLARE seq text;\n\
             BEGIN\n\
             FOR seq IN\n\
             SELECT pg_get_serial_sequence(quote_ident(c.table_schema) || '.' || quote_ident(c.table_name), c.column_name)\n\
             FROM information_schema.columns c\n\
             WHERE (c.table_schema, c.table_name) IN ({targets})\n\
             LOOP\n\
             IF seq IS NOT NULL THEN\n\
             EXECUTE 'ALTER SEQUENCE ' || seq || ' RESTART';\n\
             END IF;\n\
             END LOOP;\n\
             END $$;\n"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Relationship;

    fn public(name: &str) -> Table {
        Table::new(Some("public"), name)
    }

    #[test]
    fn default_scope_skips_system_schemas() {
        let sql = PostgresAdapter.build_table_command_text(&Scope::default());
        assert!(sql.contains("AND table_schema NOT IN ('pg_catalog', 'information_schema')"));

        let scoped = PostgresAdapter.build_table_command_text(&Scope {
            schemas_to_include: vec!["app".into()],
            ..Scope::default()
        });
        assert!(!scoped.contains("pg_catalog"));
        assert!(scoped.ends_with("AND table_schema IN ('app')"));
    }

    #[test]
    fn cyclic_parents_disable_triggers() {
        let tables: BTreeSet<Table> = [public("a"), public("b")].into_iter().collect();
        let rels = [
            Relationship::new(public("a"), public("b"), "b_a_fk"),
            Relationship::new(public("b"), public("a"), "a_b_fk"),
        ]
        .into_iter()
        .collect();
        let graph = GraphBuilder::new(&tables, &rels);

        let sql = PostgresAdapter.build_delete_command_text(&graph);

        // `a` is deleted while `b` still references it, so `a` carries the
        // trigger that would reject the delete.
        assert_eq!(
            sql,
            "ALTER TABLE \"public\".\"a\" DISABLE TRIGGER ALL;\n\
             DELETE FROM \"public\".\"a\";\n\
             DELETE FROM \"public\".\"b\";\n\
             ALTER TABLE \"public\".\"a\" ENABLE TRIGGER ALL;\n"
        );
    }

    #[test]
    fn acyclic_graph_leaves_triggers_alone() {
        let tables: BTreeSet<Table> = [public("orders"), public("customers")].into_iter().collect();
        let rels = [Relationship::new(public("customers"), public("orders"), "orders_customer_fk")]
            .into_iter()
            .collect();
        let graph = GraphBuilder::new(&tables, &rels);

        let sql = PostgresAdapter.build_delete_command_text(&graph);

        assert!(!sql.contains("TRIGGER"));
        assert_eq!(
            sql,
            "DELETE FROM \"public\".\"orders\";\nDELETE FROM \"public\".\"customers\";\n"
        );
    }

    #[test]
    fn reseed_lists_target_tables() {
        let sql = PostgresAdapter.build_reseed_command_text(&[public("orders"), public("o'neil")]);

        assert!(sql.starts_with("DO $$"));
        assert!(sql.contains("IN (('public', 'orders'), ('public', 'o''neil'))"));
        assert!(sql.contains("RESTART"));
    }

    #[test]
    fn no_temporal_support() {
        assert!(PostgresAdapter.build_temporal_support_command_text().is_none());
    }
}
