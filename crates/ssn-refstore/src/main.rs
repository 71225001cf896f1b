//! ssn-refstore - standalone smoke-test CLI for the reference store client
//!
//! Not part of the `ssn` pipeline binary; exists so a family expansion or
//! reverse lookup can be exercised against a live reference database
//! without running the full pipeline.

use anyhow::Result;
use clap::{Parser, Subcommand};
use ssn_common::logging::{init_logging, LogConfig, LogLevel};
use ssn_refstore::family::{expand_families, FamilyQuery};
use ssn_refstore::reference_store::{FamilyKind, IdKind, PgReferenceStore, ReferenceStore};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ssn-refstore")]
#[command(author, version, about = "SSN reference store smoke-test client")]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "SSN_DATABASE_URL")]
    database_url: String,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Expand a single family and print the member count
    Family {
        #[arg(long, value_enum)]
        kind: FamilyKindArg,
        id: String,
    },
    /// Reverse-resolve a batch of query IDs to UniProt accessions
    Resolve { ids: Vec<String> },
    /// Print the reference database's version string
    Version,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FamilyKindArg {
    Ipro,
    Pfam,
    Gene3d,
    Ssf,
}

impl From<FamilyKindArg> for FamilyKind {
    fn from(value: FamilyKindArg) -> Self {
        match value {
            FamilyKindArg::Ipro => FamilyKind::InterPro,
            FamilyKindArg::Pfam => FamilyKind::Pfam,
            FamilyKindArg::Gene3d => FamilyKind::Gene3D,
            FamilyKindArg::Ssf => FamilyKind::Ssf,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { LogLevel::Debug } else { LogLevel::Info };
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("ssn-refstore".to_string())
        .build();
    let log_config = LogConfig::from_env().unwrap_or(log_config);
    init_logging(&log_config)?;

    let store = PgReferenceStore::connect(&cli.database_url).await?;

    match cli.command {
        Command::Family { kind, id } => {
            let mut map = Default::default();
            expand_families(&store, &[FamilyQuery { kind: kind.into(), id }], None, &mut map).await?;
            info!(accessions = map.len(), "family expansion complete");
        },
        Command::Resolve { ids } => {
            let result = store.reverse_lookup(IdKind::Auto, &ids).await?;
            info!(
                resolved = result.uniprot_ids.len(),
                unmatched = result.unmatched.len(),
                "reverse lookup complete"
            );
        },
        Command::Version => {
            let version = store.database_version().await?;
            info!(%version, "reference database version");
        },
    }

    Ok(())
}
