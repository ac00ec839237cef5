//! One-shot ingest of a local media file.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use console::style;
use mediasearch::config::Settings;
use mediasearch::models::AssetStatus;
use mediasearch::ports::{MediaDatabase, ObjectEvent, ObjectEventKind, ObjectStore};
use mediasearch::PipelineError;
use mediasearch_pipeline::ingest::is_supported_media;
use tracing::error;

use super::super::Runtime;

pub async fn cmd_ingest(
    settings: Settings,
    file: &Path,
    bucket: &str,
    key: Option<&str>,
) -> anyhow::Result<()> {
    let key = match key {
        Some(key) => key.to_string(),
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .context("file path has no file name")?,
    };
    if !is_supported_media(&key) {
        return Err(PipelineError::InvalidInput(format!(
            "unsupported media extension for `{key}` (supported: wav, mp3, aac, flac, mp4, mov, mxf)"
        ))
        .into());
    }

    let content = std::fs::read(file)
        .with_context(|| format!("failed to read input file {}", file.display()))?;

    let runtime = Runtime::initialize(settings)?;
    let worker = runtime.worker();
    tokio::spawn(async move {
        if let Err(e) = worker.run().await {
            error!(error = %e, "worker loop exited");
        }
    });

    let meta = runtime.store.put(bucket, &key, &content, None).await?;
    println!(
        "{} Uploaded {} ({} bytes, etag {})",
        style("▶").green(),
        key,
        meta.size,
        meta.etag
    );

    let event = ObjectEvent {
        kind: ObjectEventKind::Created,
        bucket: bucket.to_string(),
        object_key: key.clone(),
        etag: Some(meta.etag.clone()),
        size: Some(meta.size),
        timestamp: meta.mtime,
    };
    runtime.ingest_controller().handle_event(&event).await?;

    // Wait for the pipeline to settle.
    loop {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let Some(asset) = runtime.db.find_asset_by_location(bucket, &key).await? else {
            continue;
        };
        match asset.status {
            AssetStatus::Indexed => {
                println!(
                    "{} Indexed as asset {} (version {})",
                    style("✓").green(),
                    asset.asset_id,
                    asset.current_version_id.as_deref().unwrap_or("-")
                );
                return Ok(());
            }
            AssetStatus::Quarantined => {
                println!(
                    "{} Quarantined: {}: {}",
                    style("✗").red(),
                    asset
                        .triage_state
                        .map(|t| t.as_str())
                        .unwrap_or("QUARANTINED"),
                    asset.recommended_action.as_deref().unwrap_or("see triage")
                );
                return Err(PipelineError::TransientResource(
                    asset.last_error.unwrap_or_else(|| "quarantined".to_string()),
                )
                .into());
            }
            AssetStatus::Failed => {
                return Err(PipelineError::Internal(
                    asset.last_error.unwrap_or_else(|| "failed".to_string()),
                )
                .into());
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_extension_before_upload() {
        assert!(!is_supported_media("notes.txt"));
        assert!(is_supported_media("talk.MP3"));
    }
}
