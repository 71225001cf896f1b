//! SSN Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the sequence-similarity
//! network (SSN) builder.
//!
//! # Overview
//!
//! This crate provides common functionality used across all workspace
//! members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Checksums**: File integrity verification utilities
//! - **Types**: Shared domain types (accessions, domain spans, edges, ...)
//! - **Logging**: Centralized `tracing` bootstrap
//!
//! # Example
//!
//! ```no_run
//! use ssn_common::Result;
//! use ssn_common::checksum::compute_file_checksum;
//! use ssn_common::types::ChecksumAlgorithm;
//!
//! fn verify_blob(path: &str) -> Result<()> {
//!     let checksum = compute_file_checksum(path, ChecksumAlgorithm::Sha256)?;
//!     println!("Reference blob checksum: {}", checksum);
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SsnError};
