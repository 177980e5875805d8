//! Command-line interface for firestore-sync
//!
//! ```bash
//! # Run the transfers described in ./settings.toml
//! firestore-sync
//!
//! # Another settings file, logging what would be written instead of writing
//! firestore-sync nightly.toml --dry-run
//!
//! # Against a local emulator
//! FIRESTORE_EMULATOR_HOST=localhost:8080 firestore-sync
//! ```

use anyhow::Context;
use clap::Parser;
use document_sink::DryRunStore;
use firestore_sink::firestore_connect;
use firestore_sync::{
    load_settings, run_transfers, NoopObserver, ProgressBars, ProgressObserver, SyncReport,
};
use firestore_sync_mssql_source::MssqlSource;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "firestore-sync")]
#[command(about = "Copy SQL Server query results into Cloud Firestore collections")]
#[command(long_about = None)]
struct Cli {
    /// Settings file
    #[arg(default_value = "settings.toml")]
    config: PathBuf,

    /// Dry run mode - run the queries but don't write to Firestore
    #[arg(long)]
    dry_run: bool,

    /// Hide the per-collection progress bars
    #[arg(long, env = "FIRESTORE_SYNC_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // reqwest and gcp_auth share one rustls provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();
    let settings = load_settings(&cli.config)?;

    tracing::info!("Initializing source (SQL Server) connection...");
    let mut source = MssqlSource::connect(&settings.relational_source).await?;

    let observer: Box<dyn ProgressObserver> = if cli.no_progress {
        Box::new(NoopObserver)
    } else {
        Box::new(ProgressBars::new())
    };

    let report = if cli.dry_run {
        tracing::info!("Dry-run mode: documents will not be written");
        let store = DryRunStore::new();
        run_transfers(
            &mut source,
            &store,
            &settings.transfer_rules,
            observer.as_ref(),
        )
        .await
    } else {
        tracing::info!("Initializing destination (Cloud Firestore) connection...");
        let opts = settings.document_store.clone().with_env_emulator();
        let store = firestore_connect(&opts).await?;
        run_transfers(
            &mut source,
            &store,
            &settings.transfer_rules,
            observer.as_ref(),
        )
        .await
    };

    if let Err(e) = source.close().await {
        tracing::warn!("{e}");
    }

    let report = report.context("Transfer failed")?;
    log_report(&report);
    Ok(())
}

fn log_report(report: &SyncReport) {
    for item in &report.items {
        if item.query_failed {
            tracing::warn!("{}: skipped, query failed", item.collection);
        } else {
            tracing::info!(
                "{}: {} rows, {} documents, {} commits",
                item.collection,
                item.rows,
                item.documents,
                item.commits
            );
        }
    }
    tracing::info!(
        "Transferring finished: {} documents in {} collections",
        report.total_documents(),
        report.items.len()
    );
}
