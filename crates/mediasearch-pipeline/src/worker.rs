//! Queue worker loop.
//!
//! Consumes jobs with bounded concurrency, enforces the per-job wall-clock
//! timeout, and settles every delivery: ack on success or retry-scheduled,
//! move-to-DLQ on quarantine. A timeout counts as one attempt against the
//! retry budget like any other transient failure.

use std::sync::Arc;

use mediasearch::config::Settings;
use mediasearch::models::{JobStatus, TerminalError, TranscriptionJob};
use mediasearch::ports::{JobQueue, MediaDatabase};
use mediasearch::PipelineError;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::orchestrator::Orchestrator;
use crate::retry::{FailureDisposition, RetryManager};

pub struct Worker {
    db: Arc<dyn MediaDatabase>,
    queue: Arc<dyn JobQueue>,
    orchestrator: Arc<Orchestrator>,
    retry: Arc<RetryManager>,
    settings: Settings,
}

impl Worker {
    pub fn new(
        db: Arc<dyn MediaDatabase>,
        queue: Arc<dyn JobQueue>,
        orchestrator: Arc<Orchestrator>,
        retry: Arc<RetryManager>,
        settings: Settings,
    ) -> Self {
        Self {
            db,
            queue,
            orchestrator,
            retry,
            settings,
        }
    }

    /// Consume until the queue's delivery channel closes.
    pub async fn run(&self) -> Result<(), PipelineError> {
        let mut deliveries = self.queue.consume().await?;
        let semaphore = Arc::new(Semaphore::new(self.settings.job_concurrency.max(1)));
        info!(
            concurrency = self.settings.job_concurrency,
            timeout_secs = self.settings.job_timeout.as_secs(),
            "worker consuming jobs"
        );

        while let Some(job) = deliveries.recv().await {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .expect("semaphore never closed");
            let db = Arc::clone(&self.db);
            let queue = Arc::clone(&self.queue);
            let orchestrator = Arc::clone(&self.orchestrator);
            let retry = Arc::clone(&self.retry);
            let timeout = self.settings.job_timeout;

            tokio::spawn(async move {
                let _permit = permit;
                process_delivery(db, queue, orchestrator, retry, timeout, job).await;
            });
        }
        Ok(())
    }
}

async fn process_delivery(
    db: Arc<dyn MediaDatabase>,
    queue: Arc<dyn JobQueue>,
    orchestrator: Arc<Orchestrator>,
    retry: Arc<RetryManager>,
    timeout: std::time::Duration,
    job: TranscriptionJob,
) {
    debug!(job_id = %job.job_id, attempt = job.attempt, "job delivered");
    if let Err(e) = db.mark_job_running(&job.job_id).await {
        error!(job_id = %job.job_id, error = %e, "failed to journal job start");
    }

    let outcome = match tokio::time::timeout(timeout, orchestrator.process_job(&job)).await {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Timeout {
            elapsed_secs: timeout.as_secs(),
        }),
    };

    match outcome {
        Ok(()) => {
            settle(&db, &job, JobStatus::Completed, None).await;
            if let Err(e) = queue.ack(&job.job_id).await {
                error!(job_id = %job.job_id, error = %e, "ack failed");
            }
        }
        Err(failure) => {
            settle(&db, &job, JobStatus::Failed, Some(&failure.to_string())).await;
            match retry.handle_failure(&job, &failure).await {
                Ok(FailureDisposition::Retried { .. }) => {
                    // The original delivery is done; the follow-up job was
                    // re-enqueued as a new delivery.
                    if let Err(e) = queue.ack(&job.job_id).await {
                        error!(job_id = %job.job_id, error = %e, "ack failed");
                    }
                }
                Ok(FailureDisposition::Quarantined { .. }) => {
                    let terminal = TerminalError::new(failure.kind(), failure.to_string());
                    if let Err(e) = queue.move_to_dlq(&job.job_id, &terminal).await {
                        error!(job_id = %job.job_id, error = %e, "move_to_dlq failed");
                    }
                }
                Err(e) => {
                    // The retry manager itself failed; return the job to
                    // pending so the failure handling re-runs.
                    error!(job_id = %job.job_id, error = %e, "failure handling failed, nacking");
                    let _ = queue.nack(&job.job_id).await;
                }
            }
        }
    }
}

async fn settle(
    db: &Arc<dyn MediaDatabase>,
    job: &TranscriptionJob,
    status: JobStatus,
    error: Option<&str>,
) {
    if let Err(e) = db.mark_job_finished(&job.job_id, status, error).await {
        error!(job_id = %job.job_id, error = %e, "failed to journal job completion");
    }
}
