//! folio-setup - Schema setup for the folio content database
//!
//! Brings the hosted database up to the site's schema:
//! - Report which collections exist
//! - Preview the operations a run would apply
//! - Create missing collections, attributes and indexes, then backfill
//!   defaults onto existing documents

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use folio_schema::catalog::{Catalog, BUILTIN_COLLECTIONS};
use folio_schema::config::SyncConfig;
use folio_schema::pipeline::Reconciler;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod error;
mod output;

use error::{CliError, CliResult};

/// folio-setup - Schema reconciliation for the folio content database
#[derive(Parser)]
#[command(name = "folio-setup")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// YAML catalog to use instead of the built-in site schema
    #[arg(long, global = true, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which catalog collections exist remotely
    Status(OutputArgs),

    /// Show the operations a run would apply, without applying them
    Plan(OutputArgs),

    /// Create missing schema and backfill defaults
    Apply(ApplyArgs),
}

#[derive(Args)]
struct OutputArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ApplyArgs {
    /// Only reconcile the schema; leave documents untouched
    #[arg(long)]
    skip_backfill: bool,

    /// Print the run report as JSON instead of progress lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "info,folio_schema=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Read configuration and the catalog. Nothing touches the network here.
fn load(catalog_path: Option<&Path>) -> CliResult<(SyncConfig, Catalog)> {
    let collection_names: &[&str] = if catalog_path.is_some() {
        &[]
    } else {
        &BUILTIN_COLLECTIONS
    };
    let config = SyncConfig::from_env(collection_names)?;
    let catalog = match catalog_path {
        Some(path) => Catalog::from_file(path)?,
        None => Catalog::builtin(&config)?,
    };
    info!(
        endpoint = %config.endpoint,
        database = %config.database_id,
        collections = catalog.collections().len(),
        "configuration loaded"
    );
    Ok((config, catalog))
}

/// Cancel the run on Ctrl-C. The current operation finishes first.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current operation");
            token.cancel();
        }
    });
    cancel
}

async fn run(cli: Cli) -> CliResult<()> {
    let (config, catalog) = load(cli.catalog.as_deref())?;
    let reconciler = Reconciler::connect(catalog, &config)?;

    match cli.command {
        Commands::Status(args) => {
            let statuses = reconciler.schema_status().await?;
            output::print_statuses(&statuses, args.json)
        }
        Commands::Plan(args) => {
            let operations = reconciler.plan().await?;
            output::print_plan(&operations, args.json)
        }
        Commands::Apply(args) => {
            let mut reconciler = reconciler
                .skip_backfill(args.skip_backfill)
                .with_cancellation(cancel_on_interrupt());
            if !args.json {
                reconciler = reconciler.with_progress(Arc::new(output::ConsoleProgress));
            }

            let report = reconciler.run().await?;
            output::print_report(&report, args.json)?;

            if report.cancelled {
                Err(CliError::Cancelled)
            } else if report.success {
                Ok(())
            } else {
                Err(CliError::RunFailed {
                    failed: report.failed().len(),
                })
            }
        }
    }
}
