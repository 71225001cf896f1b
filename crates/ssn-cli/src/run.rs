//! Drives the orchestrator: resolve the sequence set, write selection
//! artifacts, fetch reference sequences, and submit the job graph. The
//! orchestrator submits and returns; it does not wait on the scheduler.

use ssn_core::config::PipelineConfig;
use ssn_core::error::PipelineError;
use ssn_core::pipeline;
use ssn_refstore::reference_store::PgReferenceStore;
use tracing::info;

use crate::error::{CliError, Result};

/// Run the full pre-submission pipeline for one invocation of `ssn`.
/// Returns the job IDs assigned to each submitted stage.
pub async fn run(config: PipelineConfig) -> Result<Vec<(String, Option<String>)>> {
    let store = PgReferenceStore::connect(&config.database.url)
        .await
        .map_err(|e| CliError::Precondition(format!("failed to open reference store: {e}")))?;

    let mut prepared = match pipeline::prepare_sequence_set(&config, &store).await {
        Ok(prepared) => prepared,
        Err(PipelineError::Validation(msg)) if msg.contains("maxsequence") => {
            let failed_path = path_with_suffix(&config.accession_output, ".failed");
            std::fs::write(&failed_path, format!("{msg}\n"))?;
            return Err(CliError::CapacityExceeded(msg));
        },
        Err(other) => return Err(other.into()),
    };

    if prepared.selection.accessions.is_empty() {
        return Err(CliError::Precondition(
            "no sequences selected for family/accession/fasta input".to_string(),
        ));
    }

    // Manual-CD-HIT mode: the caller-supplied cluster file becomes the new
    // working set, narrowed down to its representatives, with maxsequence
    // re-checked against the smaller set.
    if config.cd_hit.is_some() {
        match pipeline::apply_manual_cd_hit(&config, &mut prepared) {
            Ok(_) => {},
            Err(PipelineError::Validation(msg)) if msg.contains("maxsequence") => {
                let failed_path = path_with_suffix(&config.accession_output, ".failed");
                std::fs::write(&failed_path, format!("{msg}\n"))?;
                return Err(CliError::CapacityExceeded(msg));
            },
            Err(other) => return Err(other.into()),
        }
    }

    pipeline::write_selection_artifacts(&config, &prepared)?;
    pipeline::write_sequence_fasta(&config, &prepared)?;

    let graph = pipeline::submit_job_graph(&config)?;
    let job_ids: Vec<(String, Option<String>)> =
        graph.stages.iter().map(|s| (s.name.to_string(), s.job_id.clone())).collect();

    info!(
        accessions = prepared.selection.accessions.len(),
        stages = job_ids.len(),
        dryrun = config.dryrun,
        "pipeline submission complete"
    );

    Ok(job_ids)
}

/// Dispatch a single resumed job-graph stage. Invoked by the rendered
/// `blastreduce`/`demux`/`graphs` stage scripts, not interactively.
pub async fn run_stage(config: &PipelineConfig, stage: &str) -> Result<()> {
    match stage {
        "blastreduce" => pipeline::run_blastreduce_stage(config)?,
        "demux" => pipeline::run_demux_stage(config)?,
        "graphs" => {
            let store = PgReferenceStore::connect(&config.database.url)
                .await
                .map_err(|e| CliError::Precondition(format!("failed to open reference store: {e}")))?;
            pipeline::run_graphs_stage(config, &store).await?;
        },
        other => return Err(CliError::Precondition(format!("unknown resumable stage: {other}"))),
    }
    Ok(())
}

fn path_with_suffix(path: &std::path::Path, suffix: &str) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    std::path::PathBuf::from(os)
}
