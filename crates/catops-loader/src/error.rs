//! Error taxonomy for a load run
//!
//! Only [`LoadError::Connectivity`] ends a run. Every other variant is caught at
//! the plan-entry boundary by the executor, reported, and the run moves on.
//! Malformed cells never show up here: the normalizer turns them into nulls.

use crate::plan::PlanError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for load operations
pub type Result<T> = std::result::Result<T, LoadError>;

#[derive(Error, Debug)]
pub enum LoadError {
    /// The target store did not answer the startup probe
    #[error("Cannot reach the target database: {0}. Check host, port and credentials.")]
    Connectivity(#[source] StoreError),

    /// A required extract file is missing
    #[error("Extract not found: '{}'", path.display())]
    SourceNotFound { path: PathBuf },

    /// The extract exists but could not be parsed
    #[error("Failed to read extract '{}': {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    /// The store rejected a chunk for this table
    #[error("Insert into '{table}' failed: {source}")]
    Insert {
        table: String,
        #[source]
        source: StoreError,
    },

    /// The post-load row count could not be fetched
    #[error("Row count for '{table}' failed: {source}")]
    Count {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl LoadError {
    pub fn insert(table: &str, source: StoreError) -> Self {
        Self::Insert {
            table: table.to_string(),
            source,
        }
    }

    pub fn count(table: &str, source: StoreError) -> Self {
        Self::Count {
            table: table.to_string(),
            source,
        }
    }

    pub fn read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Read {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error must stop the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, LoadError::Connectivity(_))
    }
}

/// Failures reported by a [`crate::store::TargetStore`]
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Column '{column}' does not exist in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Table '{0}' does not exist")]
    UnknownTable(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
