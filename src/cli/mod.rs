pub mod plan;
pub mod reset;

use anyhow::{Context, Result};

use respawn::config::RespawnConfig;
use respawn::Respawner;

/// Build a reset plan for the configured database.
fn build(config: &RespawnConfig) -> Result<Respawner> {
    let db_path = config.resolved_db_path();
    let options = config.respawner_options()?;

    Respawner::create_from_path(&db_path, options)
        .with_context(|| format!("failed to build reset plan for {}", db_path.display()))
}
