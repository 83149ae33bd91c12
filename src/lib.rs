//! Reset a relational database to a clean state between test runs.
//!
//! Respawn discovers the tables and foreign keys of a live database, orders the
//! tables so that every child is emptied before the parent it references, and
//! caches one delete script that can be replayed before each test. Schema is
//! never dropped or migrated.
//!
//! ```no_run
//! use respawn::{Respawner, RespawnerOptions};
//!
//! # fn main() -> Result<(), respawn::RespawnError> {
//! let respawner = Respawner::create_from_path("test.db", RespawnerOptions::default())?;
//! // ... run a test ...
//! respawner.reset_path("test.db")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Cycles
//!
//! Foreign key graphs may contain cycles (self-referencing tables, mutual
//! references). The ordering forces one table of each cycle out early and
//! reports the relationships that violates; the engine adapter relaxes exactly
//! those constraints around the deletes.
//!
//! # Modules
//!
//! - [`graph`]: catalog types and the deletion-order builder
//! - [`adapter`]: per-engine SQL synthesis (SQL Server, PostgreSQL, MySQL, SQLite)
//! - [`respawner`]: plan building and replay
//! - [`db`]: the connection seam and its SQLite implementation
//! - [`config`]: configuration loading from TOML files and environment variables

pub mod adapter;
pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod respawner;

pub use adapter::{DbAdapter, Engine, Scope};
pub use db::DbConnection;
pub use error::RespawnError;
pub use graph::{GraphBuilder, Relationship, Table, TemporalTable};
pub use respawner::{Respawner, RespawnerOptions};
