//! Runs stored enquiry emails from a directory through the lead pipeline.
//!
//! The directory stands in for the object store and stdout for the queue:
//! each published lead is printed as one JSON line. Logs and the per-key
//! outcome summary go to stderr.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::Parser;
use envconfig::Envconfig;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lead_extract::{
    BoundaryError, EnvMsDuration, LeadMessage, LeadPipeline, LeadQueue, ObjectStore,
    PipelineConfig, StorageKey,
};

#[derive(Parser)]
#[command(
    name = "lead-extract",
    version,
    about = "Extract leads from stored enquiry emails"
)]
struct Cli {
    /// Directory holding the raw emails
    dir: PathBuf,

    /// Keys relative to the directory; every file in it when omitted
    keys: Vec<String>,
}

#[derive(Envconfig)]
struct RunnerConfig {
    /// Upper bound on one email's run, boundary calls included
    #[envconfig(from = "LEAD_INVOCATION_TIMEOUT_MS", default = "30000")]
    invocation_timeout: EnvMsDuration,

    #[envconfig(nested = true)]
    pipeline: PipelineConfig,
}

/// Object store backed by a local directory
struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    fn path(&self, key: &StorageKey) -> PathBuf {
        self.root.join(key.as_str())
    }
}

fn classify(e: &std::io::Error) -> BoundaryError {
    match e.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied | ErrorKind::InvalidInput => {
            BoundaryError::Permanent(e.to_string())
        }
        _ => BoundaryError::Transient(e.to_string()),
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn fetch(&self, key: &StorageKey) -> Result<Vec<u8>, BoundaryError> {
        tokio::fs::read(self.path(key))
            .await
            .map_err(|e| classify(&e))
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), BoundaryError> {
        tokio::fs::remove_file(self.path(key))
            .await
            .map_err(|e| classify(&e))
    }
}

/// Queue that prints each message as a JSON line
struct StdoutQueue;

#[async_trait]
impl LeadQueue for StdoutQueue {
    async fn publish(&self, message: &LeadMessage) -> Result<String, BoundaryError> {
        let line = message
            .to_json()
            .map_err(|e| BoundaryError::Permanent(e.to_string()))?;
        println!("{line}");
        Ok(message.message_id.clone())
    }
}

async fn list_keys(dir: &Path) -> std::io::Result<Vec<StorageKey>> {
    let mut keys = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            keys.push(StorageKey::new(entry.file_name().to_string_lossy()));
        }
    }
    keys.sort();
    Ok(keys)
}

// Modification time stands in for the receipt time when `Date` is missing
async fn received_at(path: &Path) -> DateTime<Utc> {
    tokio::fs::metadata(path)
        .await
        .and_then(|meta| meta.modified())
        .map_or_else(|_| Utc::now(), DateTime::<Utc>::from)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let runner = RunnerConfig::init_from_env()?;
    let timeout = runner.invocation_timeout.0;

    let store = Arc::new(FsObjectStore {
        root: cli.dir.clone(),
    });
    let pipeline = LeadPipeline::new(runner.pipeline, store, Arc::new(StdoutQueue))?;

    let keys = if cli.keys.is_empty() {
        list_keys(&cli.dir).await?
    } else {
        cli.keys.into_iter().map(StorageKey::new).collect()
    };

    let mut retained = 0usize;
    for key in &keys {
        let received_at = received_at(&cli.dir.join(key.as_str())).await;
        match tokio::time::timeout(timeout, pipeline.process_key(key, received_at)).await {
            Ok(outcome) => {
                eprintln!("{key}: {}", outcome.label());
                if !outcome.source_deleted() {
                    retained += 1;
                }
            }
            Err(_) => {
                error!(key = %key, "Invocation timed out, email retained");
                eprintln!("{key}: timeout");
                retained += 1;
            }
        }
    }

    info!(processed = keys.len(), retained, "Run complete");
    Ok(())
}
