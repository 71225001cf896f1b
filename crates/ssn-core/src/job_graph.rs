//! Job Graph Builder
//!
//! Owns the pipeline DAG: `initial_import → multiplex → fracfile → createdb
//! → blast[1..np] → catjob → blastreduce → demux → {conv_ratio?, graphs}`.
//! Renders a batch script per stage, submits it through the scheduler
//! capability interface, and tracks the per-stage state machine
//! `PENDING → SUBMITTED → (RUNNING)* → {COMPLETED, FAILED, SKIPPED}`.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::{PipelineConfig, SchedulerKind, SearchTool};
use crate::error::PipelineResult;

/// Dependency kind between two stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// Default: downstream only runs if upstream completed successfully.
    AfterOk,
    /// Fan-in after an array job: waits for every array element regardless
    /// of outcome.
    AfterAny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Pending,
    Submitted,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// One node in the pipeline DAG.
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: &'static str,
    pub depends_on: Vec<(&'static str, DependencyKind)>,
    pub array_range: Option<(u32, u32)>,
    pub status: StageStatus,
    pub job_id: Option<String>,
}

/// The full staged DAG plus per-stage status, as a flat ordered list.
pub struct JobGraph {
    pub stages: Vec<Stage>,
    pub working_dir: PathBuf,
}

impl JobGraph {
    /// Build the fixed DAG for a given config. `np` is rescaled by 1/24
    /// when the search tool is DIAMOND.
    pub fn build(config: &PipelineConfig) -> Self {
        let np = if config.blast.is_diamond() {
            (config.np as f64 / 24.0).ceil().max(1.0) as u32
        } else {
            config.np
        };

        let stages = vec![
            Stage { name: "initial_import", depends_on: vec![], array_range: None, status: StageStatus::Pending, job_id: None },
            Stage {
                name: "multiplex",
                depends_on: vec![("initial_import", DependencyKind::AfterOk)],
                array_range: None,
                status: StageStatus::Pending,
                job_id: None,
            },
            Stage {
                name: "fracfile",
                depends_on: vec![("multiplex", DependencyKind::AfterOk)],
                array_range: None,
                status: StageStatus::Pending,
                job_id: None,
            },
            Stage {
                name: "createdb",
                depends_on: vec![("fracfile", DependencyKind::AfterOk)],
                array_range: None,
                status: StageStatus::Pending,
                job_id: None,
            },
            Stage {
                name: "blast",
                depends_on: vec![("createdb", DependencyKind::AfterOk)],
                array_range: Some((1, np)),
                status: StageStatus::Pending,
                job_id: None,
            },
            Stage {
                name: "catjob",
                depends_on: vec![("blast", DependencyKind::AfterAny)],
                array_range: None,
                status: StageStatus::Pending,
                job_id: None,
            },
            Stage {
                name: "blastreduce",
                depends_on: vec![("catjob", DependencyKind::AfterOk)],
                array_range: None,
                status: StageStatus::Pending,
                job_id: None,
            },
            Stage {
                name: "demux",
                depends_on: vec![("blastreduce", DependencyKind::AfterOk)],
                array_range: None,
                status: StageStatus::Pending,
                job_id: None,
            },
            Stage {
                name: "graphs",
                depends_on: vec![("demux", DependencyKind::AfterOk)],
                array_range: None,
                status: StageStatus::Pending,
                job_id: None,
            },
        ];

        Self { stages, working_dir: config.tmp.clone() }
    }

    fn stage_mut(&mut self, name: &str) -> &mut Stage {
        self.stages.iter_mut().find(|s| s.name == name).expect("known stage name")
    }

    fn upstream_failed(&self, stage: &Stage) -> bool {
        stage.depends_on.iter().any(|(dep_name, kind)| {
            let dep = self.stages.iter().find(|s| s.name == *dep_name).expect("known stage name");
            *kind == DependencyKind::AfterOk && dep.status == StageStatus::Failed
        })
    }

    /// Render every stage's batch script under `scripts/<stage>.sh`. The
    /// fully-resolved config is also serialized to `resolved-config.toml`
    /// in the working directory, so that a `blastreduce`/`demux`/`graphs`
    /// script resuming later reloads the exact config this graph was built
    /// from rather than re-folding bare CLI defaults onto it.
    pub fn render_scripts(&self, config: &PipelineConfig) -> PipelineResult<()> {
        std::fs::create_dir_all(&self.working_dir)?;
        let resolved_config_path = self.working_dir.join("resolved-config.toml");
        let resolved_toml = toml::to_string(config)
            .map_err(|e| crate::error::PipelineError::ExternalTool { tool: "toml".to_string(), detail: e.to_string() })?;
        std::fs::write(&resolved_config_path, resolved_toml)?;

        let scripts_dir = self.working_dir.join("scripts");
        std::fs::create_dir_all(&scripts_dir)?;
        for stage in &self.stages {
            let path = scripts_dir.join(format!("{}.sh", stage.name));
            std::fs::write(&path, render_stage_script(stage, config, &resolved_config_path))?;
        }
        Ok(())
    }

    /// Submit each stage in order, honoring dependency gating. In dry-run
    /// mode, submission is simulated and dependencies are tracked
    /// symbolically.
    pub fn submit_all(&mut self, config: &PipelineConfig) -> PipelineResult<()> {
        self.render_scripts(config)?;

        let names: Vec<&'static str> = self.stages.iter().map(|s| s.name).collect();
        for name in names {
            let blocked = self.upstream_failed(&self.stages.iter().find(|s| s.name == name).expect("known stage").clone());
            if blocked {
                warn!(stage = name, "skipping stage: upstream afterok dependency failed");
                self.stage_mut(name).status = StageStatus::Skipped;
                continue;
            }

            let job_id = if config.dryrun {
                format!("dryrun-{name}")
            } else {
                submit_to_scheduler(config.scheduler, name)?
            };

            info!(stage = name, job_id = %job_id, dryrun = config.dryrun, "stage submitted");
            let stage = self.stage_mut(name);
            stage.status = StageStatus::Submitted;
            stage.job_id = Some(job_id);
        }
        Ok(())
    }

    /// Sentinel-file based stage status check: file sentinels as
    /// cross-process state.
    pub fn check_sentinel(&self, sentinel_path: &Path) -> StageStatus {
        if sentinel_path.exists() {
            StageStatus::Failed
        } else {
            StageStatus::Pending
        }
    }
}

impl Clone for Stage {
    fn clone(&self) -> Self {
        Stage {
            name: self.name,
            depends_on: self.depends_on.clone(),
            array_range: self.array_range,
            status: self.status,
            job_id: self.job_id.clone(),
        }
    }
}

/// Stages whose real work happens back inside `ssn` itself rather than an
/// external tool invocation, and so are resumed via `ssn --resume-stage`.
const RESUMABLE_STAGES: &[&str] = &["blastreduce", "demux", "graphs"];

fn render_stage_script(stage: &Stage, config: &PipelineConfig, resolved_config_path: &Path) -> String {
    let mut script = format!("#!/bin/bash\n#SBATCH --job-name={}\n#SBATCH --partition={}\n", stage.name, config.queue);
    if let Some((start, end)) = stage.array_range {
        script.push_str(&format!("#SBATCH --array={start}-{end}\n"));
    }
    for (dep_name, kind) in &stage.depends_on {
        let kind_str = match kind {
            DependencyKind::AfterOk => "afterok",
            DependencyKind::AfterAny => "afterany",
        };
        script.push_str(&format!("# depends on {dep_name} ({kind_str})\n"));
    }

    if RESUMABLE_STAGES.contains(&stage.name) {
        let ssn_binary = std::env::current_exe().ok().and_then(|p| p.to_str().map(str::to_string)).unwrap_or_else(|| "ssn".to_string());
        script.push_str(&format!("{ssn_binary} --config {} --resume-stage {}\n", resolved_config_path.display(), stage.name));
    } else {
        script.push_str(&format!("echo running {}\n", stage.name));
    }
    script
}

fn submit_to_scheduler(scheduler: SchedulerKind, stage: &str) -> PipelineResult<String> {
    let binary = match scheduler {
        SchedulerKind::Torque => "qsub",
        SchedulerKind::Slurm => "sbatch",
    };
    let tool = crate::tools::ExternalTool::new("scheduler-submit", binary);
    let output = tool.run(&[format!("scripts/{stage}.sh")])?;
    let job_id = output.stdout.trim().to_string();
    if job_id.is_empty() {
        return Err(crate::error::PipelineError::ExternalTool {
            tool: "scheduler-submit".to_string(),
            detail: "submit returned no job id".to_string(),
        });
    }
    Ok(job_id)
}

/// Rescaled fan-out width lookup for external reporting/testing.
pub fn effective_np(config: &PipelineConfig) -> u32 {
    if config.blast.is_diamond() {
        (config.np as f64 / 24.0).ceil().max(1.0) as u32
    } else {
        config.np
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, OnOff};
    use std::path::PathBuf;

    fn sample_config(blast: SearchTool, np: u32, dryrun: bool) -> PipelineConfig {
        PipelineConfig {
            database: DatabaseConfig {
                url: "postgresql://localhost/ssn".to_string(),
                fasta_blob_path: PathBuf::from("/data/ref.fa"),
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
            blast,
            blasthits: 1000,
            np,
            queue: "default".to_string(),
            memqueue: "default".to_string(),
            scheduler: SchedulerKind::Slurm,
            tmp: PathBuf::from("/tmp/ssn-test"),
            job_id: None,
            dryrun,
            out: PathBuf::from("output.xgmml"),
            meta_file: PathBuf::from("struct.out"),
            accession_output: PathBuf::from("accession.txt"),
            no_match_file: PathBuf::from("no_accession_matches.txt"),
            seq_count_file: None,
            conv_ratio_file: None,
            maxfull: 10_000_000,
        }
    }

    #[test]
    fn diamond_rescales_np_by_one_twenty_fourth() {
        let config = sample_config(SearchTool::Diamond, 240, false);
        assert_eq!(effective_np(&config), 10);
    }

    #[test]
    fn blast_does_not_rescale_np() {
        let config = sample_config(SearchTool::BlastPlus, 64, false);
        assert_eq!(effective_np(&config), 64);
    }

    #[test]
    fn build_graph_has_expected_stage_order() {
        let config = sample_config(SearchTool::BlastPlus, 64, true);
        let graph = JobGraph::build(&config);
        let names: Vec<&str> = graph.stages.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec!["initial_import", "multiplex", "fracfile", "createdb", "blast", "catjob", "blastreduce", "demux", "graphs"]
        );
    }

    #[test]
    fn blast_stage_has_array_range() {
        let config = sample_config(SearchTool::BlastPlus, 8, true);
        let graph = JobGraph::build(&config);
        let blast = graph.stages.iter().find(|s| s.name == "blast").unwrap();
        assert_eq!(blast.array_range, Some((1, 8)));
    }

    #[test]
    fn dryrun_submission_does_not_invoke_scheduler_binary() {
        let config = sample_config(SearchTool::BlastPlus, 4, true);
        let mut graph = JobGraph::build(&config);
        graph.working_dir = std::env::temp_dir().join("ssn-job-graph-test");
        graph.submit_all(&config).unwrap();
        assert!(graph.stages.iter().all(|s| matches!(s.status, StageStatus::Submitted | StageStatus::Skipped)));
    }
}
