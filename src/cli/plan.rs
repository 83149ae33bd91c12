//! CLI `plan` command: print the deletion order and generated scripts.

use anyhow::Result;
use serde::Serialize;

use respawn::config::RespawnConfig;
use respawn::{Relationship, Table, TemporalTable};

/// Everything a build discovered and rendered, for `--json` output.
#[derive(Debug, Serialize)]
struct PlanReport<'a> {
    engine: respawn::Engine,
    deletion_order: &'a [Table],
    cyclic_relationships: Vec<&'a Relationship>,
    temporal_tables: &'a [TemporalTable],
    delete_sql: &'a str,
    reseed_sql: Option<&'a str>,
}

/// Build the plan without executing it and print it.
pub fn plan(config: &RespawnConfig, json: bool) -> Result<()> {
    let respawner = super::build(config)?;

    let report = PlanReport {
        engine: respawner.options().adapter.engine(),
        deletion_order: respawner.deletion_order(),
        cyclic_relationships: respawner.cyclic_relationships().iter().collect(),
        temporal_tables: respawner.temporal_tables(),
        delete_sql: respawner.delete_sql(),
        reseed_sql: respawner.reseed_sql(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Reset Plan ({})", report.engine);
    println!("{}", "=".repeat(40));
    println!("Deletion order:");
    for (i, table) in report.deletion_order.iter().enumerate() {
        println!("  {:>3}. {table}", i + 1);
    }

    if !report.cyclic_relationships.is_empty() {
        println!();
        println!("Cycle-broken relationships:");
        for rel in &report.cyclic_relationships {
            println!("  {rel}");
        }
    }

    if !report.temporal_tables.is_empty() {
        println!();
        println!("Temporal tables:");
        for t in report.temporal_tables {
            println!("  {} (history: {})", t.table(), t.history_table());
        }
    }

    println!();
    println!("Delete script:");
    print!("{}", report.delete_sql);

    if let Some(reseed) = report.reseed_sql {
        println!();
        println!("Reseed script:");
        print!("{reseed}");
    }

    Ok(())
}
