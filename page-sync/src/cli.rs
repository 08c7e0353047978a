/// # page-sync CLI Interface (Module)
///
/// Command parsing and orchestration for the `page-sync` binary. All
/// reconciliation logic lives in [`page_sync_core`]; this module loads the
/// config, builds the Confluence client, runs the pipeline and writes the
/// prepared documents.
///
/// ## How To Use
/// - From the command line: `page-sync sync --config sync.yaml [--dry-run]`.
/// - From tests: call [`run`] with a constructed [`Cli`].
use crate::load_config::load_config;
use crate::output::write_documents;
use anyhow::Result;
use clap::{Parser, Subcommand};
use page_sync_core::confluence::ConfluenceClient;
use page_sync_core::contract::LocalFileSystem;
use page_sync_core::synchronise::{synchronise, SynchroniseReport};
use std::path::PathBuf;

/// CLI for page-sync: mirror a markdown tree into Confluence pages.
#[derive(Parser)]
#[clap(
    name = "page-sync",
    version,
    about = "Reconcile a local markdown tree with a Confluence page hierarchy"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize the configured source tree under the configured root page
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Resolve pages without creating any or writing documents
        #[clap(long)]
        dry_run: bool,
    },
}

/// Async CLI entrypoint shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync { config, dry_run } => {
            let mut config = load_config(config)?;
            config.sync.dry_run = dry_run;
            tracing::info!(command = "sync", dry_run, "Starting synchronisation process");

            let store = ConfluenceClient::new(
                config.sync.base_url.clone(),
                config.credentials.email.clone(),
                config.credentials.token.clone(),
            );
            let report = match synchronise(&config.sync, &store, &LocalFileSystem).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(command = "sync", error = %e, "Synchronisation failed");
                    return Err(anyhow::Error::new(e).context("Synchronisation failed"));
                }
            };

            if dry_run {
                tracing::info!(command = "sync", planned = report.planned.len(), "Dry run, not writing documents");
            } else {
                write_documents(&config.output_dir, &config.sync.index_file, &report.documents)?;
            }
            println!("{}", summary(&report));
            Ok(())
        }
    }
}

/// Human-readable run summary printed on stdout.
pub fn summary(report: &SynchroniseReport) -> String {
    let mut lines = vec![format!(
        "Synchronise report: {} documents, {} matched, {} created, {} pruned",
        report.documents.len(),
        report.matched,
        report.materialize.created.len(),
        report.pruned
    )];
    for ambiguous in &report.ambiguous {
        lines.push(format!(
            "ambiguous: {} kept page {}, orphaned {}",
            ambiguous.source_path,
            ambiguous.chosen_id,
            ambiguous.orphaned_ids.join(", ")
        ));
    }
    for failed in report.materialize.failed.iter().chain(&report.invalid) {
        lines.push(format!("failed: {}: {}", failed.relative_path, failed.reason));
    }
    for skipped in &report.materialize.skipped {
        lines.push(format!("skipped: {skipped}"));
    }
    for planned in &report.planned {
        lines.push(format!("would create: {planned}"));
    }
    for diagnostic in report.link_diagnostics() {
        lines.push(format!("link: {diagnostic}"));
    }
    lines.join("\n")
}
