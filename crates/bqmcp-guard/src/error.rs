//! Error types for the guard crate.

use thiserror::Error;

/// Reasons a statement is refused before it reaches the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// The statement matched the write/DDL keyword denylist.
    #[error("{reason}")]
    Rejected { reason: String },

    /// An `INFORMATION_SCHEMA` view was referenced without a dataset prefix.
    #[error(
        "Dataset must be specified when querying INFORMATION_SCHEMA (e.g. dataset.INFORMATION_SCHEMA.{view})"
    )]
    MissingDataset { view: String },
}
