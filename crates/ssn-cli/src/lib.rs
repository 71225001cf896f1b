//! SSN CLI library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! The `ssn` binary's flag surface: a single flat invocation that resolves a
//! candidate sequence set, pre-clusters it, and submits a job graph to a
//! cluster scheduler. `ssn` has no subcommands of its own.

pub mod error;
pub mod progress;
pub mod run;

pub use error::{CliError, Result};

use clap::Parser;
use ssn_core::config::{OnOff, SchedulerKind, SearchTool};
use std::path::PathBuf;

fn parse_on_off(raw: &str) -> Result<OnOff> {
    match raw.to_ascii_lowercase().as_str() {
        "on" => Ok(OnOff::On),
        "off" => Ok(OnOff::Off),
        other => Err(CliError::Precondition(format!("expected on/off, got {other}"))),
    }
}

fn parse_blast(raw: &str) -> Result<SearchTool> {
    match raw.to_ascii_lowercase().as_str() {
        "blast" => Ok(SearchTool::Blast),
        "blast+" => Ok(SearchTool::BlastPlus),
        "blast+simple" => Ok(SearchTool::BlastPlusSimple),
        "diamond" => Ok(SearchTool::Diamond),
        "diamondsensitive" => Ok(SearchTool::Diamondsensitive),
        other => Err(CliError::Precondition(format!("unknown --blast tool: {other}"))),
    }
}

fn parse_scheduler(raw: &str) -> Result<SchedulerKind> {
    match raw.to_ascii_lowercase().as_str() {
        "torque" => Ok(SchedulerKind::Torque),
        "slurm" => Ok(SchedulerKind::Slurm),
        other => Err(CliError::Precondition(format!("unknown --scheduler: {other}"))),
    }
}

/// Split a `--ipro`/`--pfam`/`--gene3d`/`--ssf`-style comma-separated flag
/// value into individual family IDs.
fn split_comma(raw: &Option<String>) -> Vec<String> {
    raw.as_ref()
        .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

/// `ssn`: builds a sequence-similarity network from protein-family inputs.
#[derive(Parser, Debug)]
#[command(name = "ssn")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    // ---- Input selection ----
    /// Comma-separated InterPro family IDs
    #[arg(long)]
    pub ipro: Option<String>,
    /// Comma-separated Pfam family IDs
    #[arg(long)]
    pub pfam: Option<String>,
    /// Comma-separated Gene3D family IDs
    #[arg(long)]
    pub gene3d: Option<String>,
    /// Comma-separated SSF family IDs
    #[arg(long)]
    pub ssf: Option<String>,
    /// Comma-separated explicit accession IDs
    #[arg(long = "accession-id", value_delimiter = ',')]
    pub accession_id: Vec<String>,
    /// File of newline-separated accession IDs
    #[arg(long = "accession-file")]
    pub accession_file: Option<PathBuf>,
    /// User-supplied FASTA input file
    #[arg(long = "fasta-file")]
    pub fasta_file: Option<PathBuf>,
    /// Resolve IDs embedded in FASTA headers against the reference store
    #[arg(long = "use-fasta-headers")]
    pub use_fasta_headers: bool,
    /// NCBI taxid filter
    #[arg(long)]
    pub taxid: Option<String>,

    // ---- Filtering ----
    /// Domain windowing: on or off
    #[arg(long, default_value = "off")]
    pub domain: String,
    /// Keep every Nth accession (1 = keep all)
    #[arg(long, default_value_t = 1)]
    pub fraction: u32,
    /// Use uniform-random sampling instead of deterministic striding
    #[arg(long = "random-fraction")]
    pub random_fraction: bool,
    /// Fatal if the selected accession count exceeds this (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    pub maxsequence: u32,
    #[arg(long)]
    pub maxlen: Option<u32>,
    #[arg(long)]
    pub minlen: Option<u32>,
    /// BLAST e-value: a bare integer N means `1e-N`
    #[arg(long, default_value = "5")]
    pub evalue: String,

    // ---- Clustering ----
    /// Pre-cluster multiplexing: on or off
    #[arg(long, default_value = "on")]
    pub multiplex: String,
    /// CD-HIT sequence identity threshold
    #[arg(long, default_value_t = 0.9)]
    pub sim: f64,
    /// CD-HIT length-difference cutoff
    #[arg(long, default_value_t = 0.9)]
    pub lengthdif: f64,
    /// Treat FILE as a pre-computed CD-HIT cluster file (manual-CD-HIT mode)
    #[arg(long = "cd-hit")]
    pub cd_hit: Option<PathBuf>,
    /// Skip cluster-member edge expansion after search
    #[arg(long = "no-demux")]
    pub no_demux: bool,

    // ---- Similarity ----
    /// Search tool: blast, blast+, blast+simple, diamond, diamondsensitive
    #[arg(long, default_value = "blast+")]
    pub blast: String,
    #[arg(long, default_value_t = 1000)]
    pub blasthits: u32,
    /// Fan-out width for the parallel search stage
    #[arg(long, default_value_t = 64)]
    pub np: u32,

    // ---- Scheduler ----
    #[arg(long, default_value = "default")]
    pub queue: String,
    #[arg(long, default_value = "default")]
    pub memqueue: String,
    /// torque or slurm
    #[arg(long, default_value = "slurm")]
    pub scheduler: String,
    /// Working directory for staged artifacts
    #[arg(long, default_value = "./ssn-work")]
    pub tmp: PathBuf,
    #[arg(long = "job-id")]
    pub job_id: Option<String>,
    /// Render scripts and simulate submission without invoking the scheduler
    #[arg(long)]
    pub dryrun: bool,

    // ---- Outputs ----
    #[arg(long, default_value = "output.xgmml")]
    pub out: PathBuf,
    #[arg(long = "meta-file", default_value = "struct.out")]
    pub meta_file: PathBuf,
    #[arg(long = "accession-output", default_value = "accession.txt")]
    pub accession_output: PathBuf,
    #[arg(long = "no-match-file", default_value = "no_accession_matches.txt")]
    pub no_match_file: PathBuf,
    #[arg(long = "seq-count-file")]
    pub seq_count_file: Option<PathBuf>,
    #[arg(long = "conv-ratio-file")]
    pub conv_ratio_file: Option<PathBuf>,

    /// Required TOML configuration file (reference-store location, etc.)
    #[arg(long, required = true)]
    pub config: PathBuf,

    /// Verbose console logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Resume a single job-graph stage from a previously resolved config
    /// (set by the rendered stage scripts, not meant for interactive use)
    #[arg(long = "resume-stage", hide = true)]
    pub resume_stage: Option<String>,
}

impl Cli {
    /// Fold the parsed flags onto a `PipelineConfig` loaded from
    /// `--config PATH`, CLI flags taking precedence.
    pub fn into_pipeline_config(self) -> Result<ssn_core::config::PipelineConfig> {
        let mut config = ssn_core::config::PipelineConfig::load(&self.config)?;

        config.ipro = split_comma(&self.ipro);
        config.pfam = split_comma(&self.pfam);
        config.gene3d = split_comma(&self.gene3d);
        config.ssf = split_comma(&self.ssf);
        config.accession_id = self.accession_id;
        config.accession_file = self.accession_file;
        config.fasta_file = self.fasta_file;
        config.use_fasta_headers = self.use_fasta_headers;
        config.taxid = self.taxid;

        config.domain = parse_on_off(&self.domain)?;
        config.fraction = self.fraction;
        config.random_fraction = self.random_fraction;
        config.maxsequence = self.maxsequence;
        config.maxlen = self.maxlen;
        config.minlen = self.minlen;
        config.evalue = ssn_core::config::PipelineConfig::parse_evalue(&self.evalue)?;

        config.multiplex = parse_on_off(&self.multiplex)?;
        config.sim = self.sim;
        config.lengthdif = self.lengthdif;
        config.cd_hit = self.cd_hit;
        config.no_demux = self.no_demux;

        config.blast = parse_blast(&self.blast)?;
        config.blasthits = self.blasthits;
        config.np = self.np;

        config.queue = self.queue;
        config.memqueue = self.memqueue;
        config.scheduler = parse_scheduler(&self.scheduler)?;
        config.tmp = self.tmp;
        config.job_id = self.job_id;
        config.dryrun = self.dryrun;

        config.out = self.out;
        config.meta_file = self.meta_file;
        config.accession_output = self.accession_output;
        config.no_match_file = self.no_match_file;
        config.seq_count_file = self.seq_count_file;
        config.conv_ratio_file = self.conv_ratio_file;

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Vec<&'static str> {
        vec!["ssn", "--pfam", "PF00001", "--config", "ssn.toml"]
    }

    #[test]
    fn parses_minimal_invocation() {
        let cli = Cli::parse_from(base_args());
        assert_eq!(cli.pfam.as_deref(), Some("PF00001"));
        assert_eq!(cli.fraction, 1);
        assert_eq!(cli.blast, "blast+");
    }

    #[test]
    fn splits_comma_separated_family_ids() {
        let cli = Cli::parse_from(vec!["ssn", "--pfam", "PF00001,PF00002", "--config", "ssn.toml"]);
        assert_eq!(split_comma(&cli.pfam), vec!["PF00001".to_string(), "PF00002".to_string()]);
    }

    #[test]
    fn accepts_accession_id_list() {
        let cli = Cli::parse_from(vec!["ssn", "--accession-id", "P00001,P00002", "--config", "ssn.toml"]);
        assert_eq!(cli.accession_id, vec!["P00001".to_string(), "P00002".to_string()]);
    }

    #[test]
    fn rejects_unknown_on_off_value() {
        assert!(parse_on_off("maybe").is_err());
        assert!(parse_on_off("ON").is_ok());
    }

    #[test]
    fn rejects_unknown_blast_tool() {
        assert!(parse_blast("hmmer").is_err());
        assert!(parse_blast("diamondsensitive").is_ok());
    }
}
