//! builder-synth - ingest a generative-service response and export a project.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use builder_native::{discover_catalog, BuilderConfig, CatalogIndex, IngestWarning, Session};

#[derive(Debug, Parser)]
#[command(name = "builder-synth", version, about = "Synthesize a project from a generated component batch")]
struct Args {
    /// Service response file (JSON, optionally wrapped in a code fence)
    response: PathBuf,

    /// Directory the project is written to
    #[arg(short, long, default_value = "out")]
    output: PathBuf,

    /// TOML config layered over the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of catalog metadata + templates replacing the embedded catalog
    #[arg(long)]
    catalog_dir: Option<PathBuf>,

    /// List the files that would be written without writing them
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "builder_native=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = BuilderConfig::load_from(args.config.as_deref())?;
    let catalog = match &args.catalog_dir {
        Some(dir) => Arc::new(discover_catalog(dir, "local")?),
        None => CatalogIndex::builtin(),
    };
    tracing::info!(catalog_version = catalog.version(), components = catalog.len(), "catalog loaded");

    let raw = std::fs::read_to_string(&args.response)?;
    let mut session = Session::new(catalog, config);
    let report = session.ingest_payload(&raw)?;

    for warning in &report.warnings {
        match warning {
            IngestWarning::RejectedSource { type_id, error } => {
                eprintln!("warning: generated `{}` rejected: {}", type_id, error);
                for hint in &error.hints {
                    eprintln!("  hint: {}", hint);
                }
            }
            IngestWarning::UnknownType { type_id } => {
                eprintln!("warning: unknown component type `{}`", type_id);
            }
        }
    }

    let project = session.synthesize_project()?;
    for skipped in &project.skipped {
        eprintln!("warning: {} ({}) not exported: {}", skipped.id, skipped.type_id, skipped.reason);
    }

    if args.dry_run {
        for path in project.files.keys() {
            println!("{}", path);
        }
        return Ok(());
    }

    project.write_to(&args.output)?;
    println!(
        "wrote {} files for {} instances to {}",
        project.files.len(),
        report.placed.len(),
        args.output.display()
    );
    Ok(())
}
