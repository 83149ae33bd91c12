//! Library error types.

use thiserror::Error;

use crate::adapter::Engine;

/// A boxed error from the underlying connection, kept verbatim.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while building a [`crate::Respawner`] or resetting with it.
#[derive(Debug, Error)]
pub enum RespawnError {
    /// The adapter does not fit the constructor that was called.
    #[error(
        "this constructor only supports the {expected} adapter, but {actual} was configured; \
         open the connection yourself and use Respawner::create instead"
    )]
    ConfigurationMismatch { expected: Engine, actual: Engine },

    /// Discovery found no table to reset.
    #[error(
        "no tables found. Ensure the target database has at least one non-ignored table to reset; \
         check the schema filters or run migrations first"
    )]
    EmptyScope,

    /// The connection failed while discovering, deleting or toggling versioning.
    #[error("database error: {source}")]
    Database { source: BoxError },

    /// A metadata query returned a row the adapter contract does not allow.
    #[error("{query} query returned an unexpected row: {row:?}")]
    UnexpectedRow {
        query: &'static str,
        row: Vec<Option<String>>,
    },

    /// Turning system versioning back on failed after a successful delete.
    #[error("failed to restore system versioning: {source}")]
    RestoreVersioning { source: BoxError },

    /// The delete failed and restoring system versioning failed as well.
    ///
    /// The reset failure is the [`std::error::Error::source`]; the restore
    /// failure is kept alongside it.
    #[error("reset failed ({reset}) and restoring system versioning also failed ({restore})")]
    ResetAndRestore {
        #[source]
        reset: Box<RespawnError>,
        restore: Box<RespawnError>,
    },
}

impl RespawnError {
    pub(crate) fn database(err: impl Into<BoxError>) -> Self {
        Self::Database { source: err.into() }
    }

    pub(crate) fn restore_versioning(err: impl Into<BoxError>) -> Self {
        Self::RestoreVersioning { source: err.into() }
    }
}

pub type Result<T, E = RespawnError> = std::result::Result<T, E>;
