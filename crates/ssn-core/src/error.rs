//! Pipeline error types

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("reference store error: {0}")]
    RefStore(#[from] ssn_refstore::reference_store::RefStoreError),

    #[error("fastacmd error: {0}")]
    Fastacmd(#[from] ssn_refstore::fastacmd::FastacmdError),

    #[error("ssn-common error: {0}")]
    Common(#[from] ssn_common::SsnError),

    #[error("external tool {tool} failed: {detail}")]
    ExternalTool { tool: String, detail: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("no sequences selected for family/accession input")]
    EmptySelection,
}
