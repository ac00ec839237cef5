//! Watch buckets and run the pipeline.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use mediasearch::config::Settings;
use mediasearch::ports::{MediaDatabase, ObjectStore, SpeechEngine};
use tracing::{error, info};

use super::super::Runtime;

/// How often the retention purge runs while watching.
const PURGE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub async fn cmd_watch(settings: Settings, buckets: Vec<String>) -> anyhow::Result<()> {
    let runtime = Arc::new(Runtime::initialize(settings)?);

    if !runtime.engine.is_available() {
        println!(
            "{} ASR engine `{}` is not available: {}",
            style("!").yellow(),
            runtime.engine.name(),
            runtime.engine.availability_hint()
        );
    }

    // Worker pool consuming transcription jobs.
    let worker = runtime.worker();
    tokio::spawn(async move {
        if let Err(e) = worker.run().await {
            error!(error = %e, "worker loop exited");
        }
    });

    // Daily purge of archived versions past retention.
    {
        let db = Arc::clone(&runtime.db);
        let retention_days = runtime.settings.retention_days;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(PURGE_INTERVAL).await;
                let cutoff = chrono::Utc::now() - chrono::Duration::days(i64::from(retention_days));
                match db.purge_archived(cutoff).await {
                    Ok(0) => {}
                    Ok(n) => info!(purged = n, "retention purge completed"),
                    Err(e) => error!(error = %e, "retention purge failed"),
                }
            }
        });
    }

    // One ingest loop per bucket.
    let ingest = Arc::new(runtime.ingest_controller());
    let mut handles = Vec::new();
    for bucket in &buckets {
        println!("{} Watching bucket `{bucket}`", style("▶").green());
        let mut events = runtime.store.subscribe(bucket).await?;
        let ingest = Arc::clone(&ingest);
        let bucket = bucket.clone();
        handles.push(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(e) = ingest.handle_event(&event).await {
                    // Not acked: the polling subscription will redeliver,
                    // and the idempotent version id absorbs replays.
                    error!(
                        bucket = %bucket,
                        key = %event.object_key,
                        error = %e,
                        "ingest failed, awaiting redelivery"
                    );
                }
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}
