//! Error types for the `ssn` CLI

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// Missing config or an invalid flag combination. Fatal, abort before submission.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// `len(accessions) > maxsequence`.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Submit returned no job id.
    #[error("scheduler refused submission: {0}")]
    SchedulerRefusal(String),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] ssn_core::PipelineError),

    #[error("reference store error: {0}")]
    RefStore(#[from] ssn_refstore::reference_store::RefStoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
