//! Folio CLI: upload images through the Folio pipeline.
//!
//! Configuration comes from FOLIO_* environment variables (or a .env file),
//! e.g. FOLIO_API_URL, FOLIO_API_TOKEN, FOLIO_CLOUDINARY_CLOUD_NAME.

use anyhow::Context;
use clap::{Parser, Subcommand};
use folio_cli::{format_bytes, init_tracing, progress_bar, read_upload_file};
use folio_core::{UploadConfig, UploadId, UploadProfile, UploadStatus};
use folio_processing::{CompressionOptions, CompressionOutcome, ImageCompressor};
use folio_upload::{LedgerEvent, UploadOptions, UploadSession};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "folio", about = "Folio image upload CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one or more images
    Upload {
        /// Paths of the images to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Use the avatar limits (5 MB, 800px)
        #[arg(long)]
        avatar: bool,
        /// Send the files as they are
        #[arg(long)]
        no_compress: bool,
        /// Skip the direct Cloudinary upload and always use the backend
        #[arg(long)]
        no_direct: bool,
        /// Cloudinary folder for direct uploads
        #[arg(long)]
        folder: Option<String>,
    },
    /// Compress an image locally without uploading it
    Compress {
        /// Image to compress
        file: PathBuf,
        /// Where to write the result
        #[arg(long)]
        out: PathBuf,
        /// Use the avatar limits (800px, 512 KB target)
        #[arg(long)]
        avatar: bool,
    },
}

fn profile(avatar: bool) -> UploadProfile {
    if avatar {
        UploadProfile::Avatar
    } else {
        UploadProfile::General
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Upload {
            files,
            avatar,
            no_compress,
            no_direct,
            folder,
        } => {
            let mut config = UploadConfig::from_env()
                .context("Invalid upload configuration. Check FOLIO_* variables")?;
            if folder.is_some() {
                config.cloudinary_folder = folder;
            }

            let options = UploadOptions {
                profile: profile(avatar),
                compress: !no_compress,
                allow_direct: !no_direct,
                cancel: Some(CancellationToken::new()),
            };
            upload(&config, &files, options).await?;
        }
        Commands::Compress { file, out, avatar } => {
            compress(file, out, profile(avatar)).await?;
        }
    }

    Ok(())
}

async fn upload(
    config: &UploadConfig,
    paths: &[PathBuf],
    options: UploadOptions,
) -> anyhow::Result<()> {
    let session = UploadSession::from_config(config)?;
    if options.allow_direct && !session.uploader().has_direct() {
        tracing::debug!("Cloudinary direct upload not configured, using backend");
    }

    let files = paths
        .iter()
        .map(|path| read_upload_file(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    if let Some(cancel) = options.cancel.clone() {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling uploads");
                cancel.cancel();
            }
        });
    }

    let sweeper = session.ledger().start_sweeper(config.sweep_interval());
    let mut events = session.ledger().subscribe();

    let ids = session.start_batch(files, options)?;
    let names: HashMap<UploadId, String> = ids
        .iter()
        .filter_map(|id| {
            session
                .ledger()
                .get(*id)
                .map(|record| (*id, record.file.file_name))
        })
        .collect();

    let records = {
        let wait = session.wait_all();
        tokio::pin!(wait);
        loop {
            tokio::select! {
                records = &mut wait => break records,
                event = events.recv() => match event {
                    Ok(LedgerEvent::Progress { id, progress }) => {
                        let name = names.get(&id).map(String::as_str).unwrap_or("?");
                        eprintln!("{:<32} {}", name, progress_bar(progress, 30));
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) | Err(RecvError::Closed) => {}
                },
            }
        }
    };
    sweeper.abort();

    let total = records.len();
    let failed = records
        .iter()
        .filter(|record| record.status == UploadStatus::Error)
        .count();

    print_json(&serde_json::json!({
        "uploaded": total - failed,
        "failed": failed,
        "uploads": records,
    }))?;

    if failed > 0 {
        anyhow::bail!("{} of {} uploads failed", failed, total);
    }
    Ok(())
}

async fn compress(path: PathBuf, out: PathBuf, profile: UploadProfile) -> anyhow::Result<()> {
    let file = read_upload_file(&path)?;
    let options = CompressionOptions::for_profile(profile);

    let input = file.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        ImageCompressor::compress(&input, &options, &mut |_| {})
    })
    .await
    .context("Compression task failed")??;

    let summary = match &outcome {
        CompressionOutcome::Compressed {
            file: compressed,
            original_size,
            compressed_size,
        } => serde_json::json!({
            "compressed": true,
            "content_type": compressed.content_type,
            "original_size": format_bytes(*original_size),
            "compressed_size": format_bytes(*compressed_size),
        }),
        CompressionOutcome::Skipped(reason) => serde_json::json!({
            "compressed": false,
            "reason": format!("{:?}", reason),
            "size": format_bytes(file.size()),
        }),
    };

    let result = outcome.into_file(&file);
    std::fs::write(&out, &result.data).with_context(|| format!("Write {}", out.display()))?;

    print_json(&summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_tries_direct_by_default() {
        let cli = Cli::try_parse_from(["folio", "upload", "a.jpg"]).unwrap();
        assert!(matches!(cli.command, Commands::Upload { no_direct: false, .. }));

        let cli = Cli::try_parse_from(["folio", "upload", "--no-direct", "a.jpg"]).unwrap();
        assert!(matches!(cli.command, Commands::Upload { no_direct: true, .. }));
    }
}
