//! CLI `reset` command: delete all rows after user confirmation.

use anyhow::{bail, Context, Result};
use std::io::Write;

use respawn::config::RespawnConfig;

/// Delete every row of every in-scope table, asking first unless `yes`.
pub fn reset(config: &RespawnConfig, yes: bool) -> Result<()> {
    let db_path = config.resolved_db_path();
    let respawner = super::build(config)?;

    if !yes {
        println!(
            "WARNING: This will permanently delete ALL rows from {} tables.",
            respawner.deletion_order().len()
        );
        println!("Database: {}", db_path.display());
        print!("\nType YES to confirm: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != "YES" {
            bail!("reset cancelled");
        }
    }

    respawner
        .reset_path(&db_path)
        .with_context(|| format!("failed to reset {}", db_path.display()))?;

    println!("Database reset complete.");
    Ok(())
}
