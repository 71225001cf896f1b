//! `ssn` — builds a sequence-similarity network from protein-family inputs.

use clap::Parser;
use ssn_cli::{run, Cli};
use ssn_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::builder().level(LogLevel::Debug).output(LogOutput::Console).log_file_prefix("ssn".to_string()).build()
    } else {
        LogConfig::builder().level(LogLevel::Info).output(LogOutput::Console).log_file_prefix("ssn".to_string()).build()
    };
    let log_config = LogConfig::from_env().unwrap_or(log_config);
    let _ = init_logging(&log_config);

    if let Err(e) = execute(cli).await {
        error!(error = %e, "ssn failed");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn execute(cli: Cli) -> ssn_cli::Result<()> {
    // A resumed stage script already has a fully-resolved config on disk;
    // re-folding bare CLI defaults over it would clobber it, so load it
    // directly rather than going through `into_pipeline_config`.
    if let Some(stage) = cli.resume_stage.clone() {
        let config = ssn_core::config::PipelineConfig::load(&cli.config)?;
        run::run_stage(&config, &stage).await?;
        return Ok(());
    }

    let config = cli.into_pipeline_config()?;
    let job_ids = run::run(config).await?;

    for (stage, job_id) in &job_ids {
        println!("{stage}: {}", job_id.as_deref().unwrap_or("skipped"));
    }
    Ok(())
}
