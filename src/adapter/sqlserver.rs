//! SQL Server adapter.
//!
//! Reads the catalog from `sys.*` views. Cyclic foreign keys are switched to
//! `NOCHECK` around the deletes and re-validated afterwards. Temporal tables
//! are supported from compatibility level 130 (SQL Server 2016).

use super::{literal, quote_identifier, scope_predicate, script, DbAdapter, Engine, Scope};
use crate::graph::{GraphBuilder, Relationship, Table, TemporalTable};

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerAdapter;

fn quote(ident: &str) -> String {
    quote_identifier(ident, '[', ']')
}

fn quote_table(table: &Table) -> String {
    match &table.schema {
        Some(schema) => format!("{}.{}", quote(schema), quote(&table.name)),
        None => quote(&table.name),
    }
}

/// Prefix `'...'` literals with `N` so non-ASCII names survive.
fn nliteral(value: &str) -> String {
    format!("N{}", literal(value))
}

impl SqlServerAdapter {
    fn nocheck(rel: &Relationship) -> String {
        format!(
            "ALTER TABLE {} NOCHECK CONSTRAINT {};",
            quote_table(&rel.child),
            quote(&rel.name)
        )
    }

    fn recheck(rel: &Relationship) -> String {
        format!(
            "ALTER TABLE {} WITH CHECK CHECK CONSTRAINT {};",
            quote_table(&rel.child),
            quote(&rel.name)
        )
    }
}

impl DbAdapter for SqlServerAdapter {
    fn engine(&self) -> Engine {
        Engine::SqlServer
    }

    fn build_table_command_text(&self, scope: &Scope) -> String {
        format!(
            "SELECT s.name, t.name\n\
             FROM sys.tables t\n\
             INNER JOIN sys.schemas s ON t.schema_id = s.schema_id\n\
             WHERE t.is_ms_shipped = 0\n\
             {}",
            scope_predicate(scope, Some("s.name"), "t.name")
        )
        .trim_end()
        .to_string()
    }

    fn build_relationship_command_text(&self, scope: &Scope) -> String {
        let child = scope_predicate(scope, Some("fk_schema.name"), "fk_table.name");
        let parent = scope_predicate(scope, Some("pk_schema.name"), "pk_table.name");
        format!(
            "SELECT fk_schema.name, fk_table.name, pk_schema.name, pk_table.name, fk.name\n\
             FROM sys.foreign_keys fk\n\
             INNER JOIN sys.tables fk_table ON fk.parent_object_id = fk_table.object_id\n\
             INNER JOIN sys.schemas fk_schema ON fk_table.schema_id = fk_schema.schema_id\n\
             INNER JOIN sys.tables pk_table ON fk.referenced_object_id = pk_table.object_id\n\
             INNER JOIN sys.schemas pk_schema ON pk_table.schema_id = pk_schema.schema_id\n\
             WHERE 1 = 1\n\
             {child}\n\
             {parent}"
        )
        .trim_end()
        .to_string()
    }

    fn build_temporal_support_command_text(&self) -> Option<String> {
        Some(
            "SELECT CASE WHEN compatibility_level >= 130 THEN 1 ELSE 0 END\n\
             FROM sys.databases\n\
             WHERE name = DB_NAME()"
                .to_string(),
        )
    }

    fn build_temporal_table_command_text(&self, scope: &Scope) -> String {
        format!(
            "SELECT s.name, t.name, hs.name, ht.name\n\
             FROM sys.tables t\n\
             INNER JOIN sys.schemas s ON t.schema_id = s.schema_id\n\
             INNER JOIN sys.tables ht ON t.history_table_id = ht.object_id\n\
             INNER JOIN sys.schemas hs ON ht.schema_id = hs.schema_id\n\
             WHERE t.temporal_type = 2\n\
             {}",
            scope_predicate(scope, Some("s.name"), "t.name")
        )
        .trim_end()
        .to_string()
    }

    fn build_delete_command_text(&self, graph: &GraphBuilder) -> String {
        let mut lines: Vec<String> = graph
            .cyclic_relationships()
            .iter()
            .map(Self::nocheck)
            .collect();

        lines.extend(
            graph
                .to_delete()
                .iter()
                .map(|table| format!("DELETE {};", quote_table(table))),
        );

        lines.extend(graph.cyclic_relationships().iter().map(Self::recheck));

        script(lines)
    }

    fn build_reseed_command_text(&self, tables: &[Table]) -> String {
        let mut lines = vec!["DECLARE @reseed bigint;".to_string()];

        // Only identities that have handed out a value are reseeded, so the
        // next insert gets the original seed again.
        for table in tables {
            let name = nliteral(&quote_table(table));
            lines.push(format!(
                "SELECT @reseed = CONVERT(bigint, seed_value) - CONVERT(bigint, increment_value) \
                 FROM sys.identity_columns \
                 WHERE object_id = OBJECT_ID({name}) AND last_value IS NOT NULL;"
            ));
            lines.push(format!(
                "IF @@ROWCOUNT > 0 DBCC CHECKIDENT ({name}, RESEED, @reseed);"
            ));
        }

        script(lines)
    }

    fn build_turn_off_system_versioning_command_text(&self, tables: &[TemporalTable]) -> String {
        script(
            tables
                .iter()
                .map(|t| {
                    format!(
                        "ALTER TABLE {} SET (SYSTEM_VERSIONING = OFF);",
                        quote_table(&t.table())
                    )
                })
                .collect(),
        )
    }

    fn build_turn_on_system_versioning_command_text(&self, tables: &[TemporalTable]) -> String {
        script(
            tables
                .iter()
                .map(|t| {
                    format!(
                        "ALTER TABLE {} SET (SYSTEM_VERSIONING = ON (HISTORY_TABLE = {}));",
                        quote_table(&t.table()),
                        quote_table(&t.history_table())
                    )
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn dbo(name: &str) -> Table {
        Table::new(Some("dbo"), name)
    }

    #[test]
    fn delete_script_follows_graph_order() {
        let tables: BTreeSet<Table> = [dbo("Customers"), dbo("Orders")].into_iter().collect();
        let rels = [Relationship::new(dbo("Customers"), dbo("Orders"), "FK_Orders_Customers")]
            .into_iter()
            .collect();
        let graph = GraphBuilder::new(&tables, &rels);

        let sql = SqlServerAdapter.build_delete_command_text(&graph);

        assert_eq!(sql, "DELETE [dbo].[Orders];\nDELETE [dbo].[Customers];\n");
    }

    #[test]
    fn cyclic_constraints_are_suspended_around_deletes() {
        let rel = Relationship::new(dbo("Node"), dbo("Node"), "FK_Node_Parent");
        let tables: BTreeSet<Table> = [dbo("Node")].into_iter().collect();
        let graph = GraphBuilder::new(&tables, &[rel].into_iter().collect());

        let sql = SqlServerAdapter.build_delete_command_text(&graph);
        let lines: Vec<&str> = sql.lines().collect();

        assert_eq!(
            lines,
            [
                "ALTER TABLE [dbo].[Node] NOCHECK CONSTRAINT [FK_Node_Parent];",
                "DELETE [dbo].[Node];",
                "ALTER TABLE [dbo].[Node] WITH CHECK CHECK CONSTRAINT [FK_Node_Parent];",
            ]
        );
    }

    #[test]
    fn reseed_targets_each_table() {
        let sql = SqlServerAdapter.build_reseed_command_text(&[dbo("Orders"), dbo("Customers")]);

        assert!(sql.starts_with("DECLARE @reseed bigint;"));
        assert!(sql.contains("OBJECT_ID(N'[dbo].[Orders]')"));
        assert!(sql.contains("DBCC CHECKIDENT (N'[dbo].[Customers]', RESEED, @reseed);"));
    }

    #[test]
    fn versioning_toggles_name_history_table() {
        let temporal = [TemporalTable::new(Some("dbo"), "Prices", "history", "PricesHistory")];

        let off = SqlServerAdapter.build_turn_off_system_versioning_command_text(&temporal);
        let on = SqlServerAdapter.build_turn_on_system_versioning_command_text(&temporal);

        assert_eq!(off, "ALTER TABLE [dbo].[Prices] SET (SYSTEM_VERSIONING = OFF);\n");
        assert_eq!(
            on,
            "ALTER TABLE [dbo].[Prices] SET (SYSTEM_VERSIONING = ON (HISTORY_TABLE = [history].[PricesHistory]));\n"
        );
    }

    #[test]
    fn table_query_applies_scope() {
        let scope = Scope {
            schemas_to_exclude: vec!["audit".into()],
            ..Scope::default()
        };

        let sql = SqlServerAdapter.build_table_command_text(&scope);

        assert!(sql.starts_with("SELECT s.name, t.name"));
        assert!(sql.ends_with("AND s.name NOT IN ('audit')"));
    }

    #[test]
    fn relationship_query_scopes_both_ends() {
        let scope = Scope {
            schemas_to_include: vec!["dbo".into()],
            ..Scope::default()
        };

        let sql = SqlServerAdapter.build_relationship_command_text(&scope);

        assert!(sql.contains("AND fk_schema.name IN ('dbo')"));
        assert!(sql.contains("AND pk_schema.name IN ('dbo')"));
    }

    #[test]
    fn supports_temporal_probe() {
        let probe = SqlServerAdapter.build_temporal_support_command_text().unwrap();
        assert!(probe.contains("compatibility_level >= 130"));
    }
}
