//! SkyDrive command-line uploader entry point.

mod args;
mod config;
mod prompt;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use skydrive_api::Client;
use skydrive_transfer::format_size;
use skydrive_uploader::{
    ConflictDecision, TaskId, TaskStatus, UploadEvent, Uploader, scan_sources,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, ConflictMode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = match config::UploaderConfig::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "failed to load config, using defaults");
            config::UploaderConfig::default()
        }
    };
    cli.apply(&mut config);
    if cli.save_config {
        config.save().context("failed to save config")?;
        info!("configuration saved");
    }

    let token = Some(config.api_token.as_str()).filter(|t| !t.is_empty());
    let client = Client::with_timeouts(&config.server_url, token, config.timeouts())
        .context("failed to create API client")?;
    debug!(api = client.base_url(), "client ready");
    let (uploader, channels) = Uploader::new(Arc::new(client), config.engine_config());

    match cli.on_conflict {
        ConflictMode::Ask => {}
        ConflictMode::Always(action) => uploader.set_conflict_default(ConflictDecision::always(action)),
    }

    let prompts = prompt::spawn(channels.prompts);
    let reporter = tokio::spawn(report(channels.events));

    for path in &cli.paths {
        let sources = scan_sources(path, cli.parent_id)
            .with_context(|| format!("failed to scan {}", path.display()))?;
        if sources.is_empty() {
            warn!(path = %path.display(), "nothing to upload");
            continue;
        }
        let total: u64 = sources.iter().map(|s| s.size).sum();
        let ids = uploader.submit_all(sources).await?;
        info!(
            path = %path.display(),
            files = ids.len(),
            size = %format_size(total),
            "queued"
        );
    }

    tokio::select! {
        result = uploader.wait_idle() => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, cancelling uploads");
            uploader.clear_all().await;
            std::process::exit(130);
        }
    }

    let snapshots = uploader.snapshots();
    let succeeded = snapshots
        .iter()
        .filter(|s| s.status == TaskStatus::Succeeded)
        .count();
    let failed: Vec<_> = snapshots
        .iter()
        .filter(|s| s.status == TaskStatus::Failed)
        .collect();

    for snapshot in &failed {
        let name = snapshot.relative_path.as_deref().unwrap_or(&snapshot.name);
        error!(file = %name, error = snapshot.error.as_deref().unwrap_or(""), "upload failed");
    }
    info!(succeeded, failed = failed.len(), "all uploads finished");

    reporter.abort();
    prompts.abort();

    if !failed.is_empty() {
        bail!("{} of {} uploads failed", failed.len(), snapshots.len());
    }
    Ok(())
}

/// Logs engine events until the uploader is dropped.
async fn report(mut events: mpsc::Receiver<UploadEvent>) {
    let mut last_percent: HashMap<TaskId, u8> = HashMap::new();
    while let Some(event) = events.recv().await {
        match event {
            UploadEvent::StatusChanged {
                task_id,
                status,
                message,
            } => {
                tracing::debug!(task = %task_id, status = status.as_str(), %message, "status");
            }
            UploadEvent::Progress {
                task_id,
                percent,
                message,
            } => {
                // Log every tenth percent to keep the output readable.
                let last = last_percent.entry(task_id).or_insert(0);
                if percent / 10 > *last / 10 {
                    info!(task = %task_id, percent, %message, "progress");
                }
                *last = percent;
            }
            UploadEvent::Succeeded { task_id, message } => {
                last_percent.remove(&task_id);
                info!(task = %task_id, %message, "uploaded");
            }
            UploadEvent::Failed { task_id, error } => {
                last_percent.remove(&task_id);
                warn!(task = %task_id, %error, "failed");
            }
            UploadEvent::Removed { task_id } => {
                last_percent.remove(&task_id);
            }
        }
    }
}
