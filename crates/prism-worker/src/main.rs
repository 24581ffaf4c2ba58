//! prism — generate image derivatives for an S3 event notification.
//!
//! Reads the notification from a file argument or stdin. Configuration comes
//! from the environment (see `WorkerConfig`). Exits non-zero if any record failed.

use anyhow::Context;
use clap::Parser;
use prism_core::{parse_event, WorkerConfig};
use prism_storage::create_store;
use prism_worker::{init_tracing, Orchestrator, ProcessOutcome};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "prism", about = "Generate image derivatives for uploaded objects")]
struct Cli {
    /// Path to an S3 event notification (JSON). Reads stdin when omitted.
    event: Option<PathBuf>,

    /// Cancel the invocation after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = WorkerConfig::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    let payload = read_event(cli.event.as_deref()).await?;
    let sources = parse_event(&payload).context("Failed to parse event notification")?;

    let catalog = config
        .load_catalog()
        .context("Failed to load variant catalog")?;
    let store = create_store(&config)
        .await
        .context("Failed to initialize object store")?;
    let orchestrator = Orchestrator::from_config(&config, store, catalog);

    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, cli.deadline_secs);

    let results = orchestrator.process_all(&sources, &cancel).await;

    let mut failed = 0;
    for (source, result) in sources.iter().zip(&results) {
        match result {
            Ok(ProcessOutcome::Completed { keys }) => {
                tracing::info!(
                    bucket = %source.bucket,
                    key = %source.key,
                    derivatives = keys.len(),
                    "Record processed"
                );
            }
            Ok(ProcessOutcome::Skipped { decision }) => {
                tracing::info!(
                    bucket = %source.bucket,
                    key = %source.key,
                    reason = %decision,
                    "Record skipped"
                );
            }
            Err(e) => {
                failed += 1;
                tracing::error!(
                    error = %e,
                    bucket = %source.bucket,
                    key = %source.key,
                    variant = e.variant().unwrap_or("-"),
                    "Record failed"
                );
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} records failed", failed, sources.len());
    }

    Ok(())
}

async fn read_event(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read event file {}", path.display())),
        None => {
            let mut payload = String::new();
            tokio::io::stdin()
                .read_to_string(&mut payload)
                .await
                .context("Failed to read event from stdin")?;
            Ok(payload)
        }
    }
}

fn spawn_cancel_triggers(cancel: &CancellationToken, deadline_secs: Option<u64>) {
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling");
            token.cancel();
        }
    });

    if let Some(secs) = deadline_secs {
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            tracing::warn!(deadline_secs = secs, "Deadline reached, cancelling");
            token.cancel();
        });
    }
}
