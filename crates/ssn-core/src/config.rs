//! Config & Environment Resolver
//!
//! Loads the pipeline configuration from a required TOML file layered with
//! CLI flags and environment variables, then validates the mutual
//! constraints between input-source flags and numeric thresholds in one
//! place rather than scattering checks through the pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};

/// Whether domain windowing is applied to the sequence set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnOff {
    On,
    Off,
}

impl OnOff {
    pub fn is_on(self) -> bool {
        matches!(self, OnOff::On)
    }
}

/// One of the supported similarity search tool families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchTool {
    Blast,
    #[serde(rename = "blast+")]
    BlastPlus,
    #[serde(rename = "blast+simple")]
    BlastPlusSimple,
    Diamond,
    Diamondsensitive,
}

impl SearchTool {
    /// DIAMOND parallelizes internally, so its fan-out width is rescaled by
    /// 1/24 rather than split across the full `np` fan-out.
    pub fn is_diamond(self) -> bool {
        matches!(self, SearchTool::Diamond | SearchTool::Diamondsensitive)
    }
}

/// Target cluster scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    Torque,
    Slurm,
}

/// Reference-store location. Required: the pipeline refuses to run if the
/// reference-database location is not supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub fasta_blob_path: PathBuf,
    pub fastacmd_binary: String,
}

/// Full pipeline configuration, assembled from `--config PATH` (TOML),
/// overridden by CLI flags, overridden again by environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub database: DatabaseConfig,

    // Input selection
    pub ipro: Vec<String>,
    pub pfam: Vec<String>,
    pub gene3d: Vec<String>,
    pub ssf: Vec<String>,
    pub accession_id: Vec<String>,
    pub accession_file: Option<PathBuf>,
    pub fasta_file: Option<PathBuf>,
    pub use_fasta_headers: bool,
    pub taxid: Option<String>,

    // Filtering
    pub domain: OnOff,
    pub fraction: u32,
    pub random_fraction: bool,
    pub maxsequence: u32,
    pub maxlen: Option<u32>,
    pub minlen: Option<u32>,
    pub evalue: f64,

    // Clustering
    pub multiplex: OnOff,
    pub sim: f64,
    pub lengthdif: f64,
    pub cd_hit: Option<PathBuf>,
    pub no_demux: bool,

    // Similarity
    pub blast: SearchTool,
    pub blasthits: u32,
    pub np: u32,

    // Scheduler
    pub queue: String,
    pub memqueue: String,
    pub scheduler: SchedulerKind,
    pub tmp: PathBuf,
    pub job_id: Option<String>,
    pub dryrun: bool,

    // Outputs
    pub out: PathBuf,
    pub meta_file: PathBuf,
    pub accession_output: PathBuf,
    pub no_match_file: PathBuf,
    pub seq_count_file: Option<PathBuf>,
    pub conv_ratio_file: Option<PathBuf>,

    /// Size guard for the network writer.
    #[serde(default = "default_maxfull")]
    pub maxfull: u64,
}

fn default_maxfull() -> u64 {
    10_000_000
}

impl PipelineConfig {
    /// Load from a required TOML config file, then apply environment
    /// variable overrides (`SSN_DATABASE_URL`, `SSN_FASTACMD_BINARY`).
    pub fn load(path: &Path) -> PipelineResult<Self> {
        dotenvy::dotenv().ok();
        let text = std::fs::read_to_string(path)?;
        let mut config: PipelineConfig = toml::from_str(&text)
            .map_err(|e| PipelineError::Config(format!("invalid config file {}: {e}", path.display())))?;

        if let Ok(url) = std::env::var("SSN_DATABASE_URL") {
            config.database.url = url;
        }
        if let Ok(binary) = std::env::var("SSN_FASTACMD_BINARY") {
            config.database.fastacmd_binary = binary;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the mutual constraints between input-source flags and the
    /// numeric thresholds.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.database.url.is_empty() {
            return Err(PipelineError::Validation(
                "reference database location must be supplied".to_string(),
            ));
        }

        if self.fraction == 0 {
            return Err(PipelineError::Validation("fraction must be >= 1".to_string()));
        }

        if !(0.0..=1.0).contains(&self.sim) {
            return Err(PipelineError::Validation("sim must be in [0, 1]".to_string()));
        }
        if !(0.0..=1.0).contains(&self.lengthdif) {
            return Err(PipelineError::Validation("lengthdif must be in [0, 1]".to_string()));
        }

        let input_sources = [
            self.fasta_file.is_some(),
            !self.ipro.is_empty() || !self.pfam.is_empty() || !self.gene3d.is_empty() || !self.ssf.is_empty(),
            !self.accession_id.is_empty() || self.accession_file.is_some(),
            self.taxid.is_some(),
        ];
        let source_count = input_sources.iter().filter(|&&present| present).count();
        if source_count != 1 {
            return Err(PipelineError::Validation(format!(
                "exactly one input source required (FASTA, family list, accession list, or taxid); found {source_count}"
            )));
        }

        Ok(())
    }

    /// Normalize an `--evalue` flag: a bare integer `N` becomes `1e-N`, an
    /// explicit `1e-X` string is parsed as-is.
    pub fn parse_evalue(raw: &str) -> PipelineResult<f64> {
        if let Ok(n) = raw.parse::<u32>() {
            return Ok(10f64.powi(-(n as i32)));
        }
        raw.parse::<f64>()
            .map_err(|_| PipelineError::Validation(format!("invalid evalue: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_evalue_bare_integer() {
        assert_eq!(PipelineConfig::parse_evalue("5").unwrap(), 1e-5);
    }

    #[test]
    fn parse_evalue_explicit_scientific() {
        assert_eq!(PipelineConfig::parse_evalue("1e-10").unwrap(), 1e-10);
    }

    #[test]
    fn parse_evalue_rejects_garbage() {
        assert!(PipelineConfig::parse_evalue("not-a-number").is_err());
    }

    fn base_config() -> PipelineConfig {
        PipelineConfig {
            database: DatabaseConfig {
                url: "postgresql://localhost/ssn".to_string(),
                fasta_blob_path: PathBuf::from("/data/reference.fa"),
                fastacmd_binary: "fastacmd".to_string(),
            },
            ipro: vec![],
            pfam: vec!["PF00001".to_string()],
            gene3d: vec![],
            ssf: vec![],
            accession_id: vec![],
            accession_file: None,
            fasta_file: None,
            use_fasta_headers: false,
            taxid: None,
            domain: OnOff::Off,
            fraction: 1,
            random_fraction: false,
            maxsequence: 0,
            maxlen: None,
            minlen: None,
            evalue: 1e-5,
            multiplex: OnOff::On,
            sim: 0.5,
            lengthdif: 0.9,
            cd_hit: None,
            no_demux: false,
            blast: SearchTool::BlastPlus,
            blasthits: 1000,
            np: 64,
            queue: "default".to_string(),
            memqueue: "default".to_string(),
            scheduler: SchedulerKind::Slurm,
            tmp: PathBuf::from("/tmp/ssn"),
            job_id: None,
            dryrun: false,
            out: PathBuf::from("output.xgmml"),
            meta_file: PathBuf::from("struct.out"),
            accession_output: PathBuf::from("accession.txt"),
            no_match_file: PathBuf::from("no_accession_matches.txt"),
            seq_count_file: None,
            conv_ratio_file: None,
            maxfull: default_maxfull(),
        }
    }

    #[test]
    fn validate_requires_exactly_one_input_source() {
        let mut config = base_config();
        config.pfam.clear();
        assert!(config.validate().is_err());

        config.pfam.push("PF00001".to_string());
        config.taxid = Some("9606".to_string());
        assert!(config.validate().is_err());

        config.taxid = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_fraction_zero() {
        let mut config = base_config();
        config.fraction = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_sim() {
        let mut config = base_config();
        config.sim = 1.5;
        assert!(config.validate().is_err());
    }
}
