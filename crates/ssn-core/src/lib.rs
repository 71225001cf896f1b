//! SSN Pipeline Core
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
//!
//! Builds sequence-similarity networks from protein-family inputs: resolves
//! a candidate sequence set, drives an external clustering and similarity
//! search, and emits an annotated XGMML network.
//!
//! # Architecture
//!
//! Data flow follows the pipeline orchestrator shape: [`config`] validates
//! the invocation, then [`header_parser`] and `ssn_refstore::family` each
//! contribute candidate accessions into [`selection`]; [`cluster`] drives
//! the external clusterer and later demultiplexes edges; [`job_graph`] and
//! [`tools`] own staged submission to the cluster scheduler; [`edges`]
//! reduces raw hits; [`annotations`] loads the annotation file; [`network`]
//! writes the final XGMML document.
//!
//! # Example
//!
//! ```no_run
//! use ssn_core::config::PipelineConfig;
//! use std::path::Path;
//!
//! fn load(config_path: &Path) -> anyhow::Result<()> {
//!     let config = PipelineConfig::load(config_path)?;
//!     config.validate()?;
//!     Ok(())
//! }
//! ```

pub mod annotations;
pub mod cluster;
pub mod config;
pub mod edges;
pub mod error;
pub mod header_parser;
pub mod job_graph;
pub mod network;
pub mod pipeline;
pub mod selection;
pub mod tools;

pub use error::{PipelineError, PipelineResult};
