//! Retry / quarantine manager.
//!
//! Classifies failures, schedules delayed retries within the attempt
//! budget, and parks exhausted or terminal failures in the dead-letter
//! queue with a triage classification. Also implements the operator-level
//! triage actions.

use std::sync::Arc;
use std::time::Duration;

use mediasearch::classify::{classify, triage_for};
use mediasearch::config::Settings;
use mediasearch::models::{DlqItem, TerminalError, TranscriptionJob};
use mediasearch::ports::{JobQueue, MediaDatabase};
use mediasearch::retry::{backoff_delay, within_budget};
use mediasearch::PipelineError;
use tracing::{info, warn};

/// What the manager decided to do with a failed job.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureDisposition {
    /// A follow-up job was scheduled after the given delay.
    Retried { attempt: u32, delay: Duration },
    /// The job was parked in the DLQ and the asset quarantined.
    Quarantined { dlq_id: String },
}

pub struct RetryManager {
    db: Arc<dyn MediaDatabase>,
    queue: Arc<dyn JobQueue>,
    settings: Settings,
}

impl RetryManager {
    pub fn new(
        db: Arc<dyn MediaDatabase>,
        queue: Arc<dyn JobQueue>,
        settings: Settings,
    ) -> Self {
        Self {
            db,
            queue,
            settings,
        }
    }

    /// Route a failed job: delayed re-enqueue while the error is retryable
    /// and attempts remain, dead-letter otherwise.
    pub async fn handle_failure(
        &self,
        job: &TranscriptionJob,
        error: &PipelineError,
    ) -> Result<FailureDisposition, PipelineError> {
        let kind = classify(error);
        let message = error.to_string();

        if kind.is_retryable() && within_budget(job.attempt, self.settings.max_attempts) {
            let delay = backoff_delay(
                job.attempt,
                self.settings.retry_base_delay,
                self.settings.retry_max_delay,
            );
            let next = job.next_attempt();
            self.db
                .mark_retry_pending(&job.asset_id, &message, next.attempt)
                .await?;
            self.db.record_job(&next).await?;
            let attempt = next.attempt;
            self.queue.enqueue_delayed(next, delay).await?;
            info!(
                asset_id = %job.asset_id,
                version_id = %job.version_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                kind = %kind,
                "transient failure, retry scheduled"
            );
            return Ok(FailureDisposition::Retried { attempt, delay });
        }

        let retries_exhausted = kind.is_retryable();
        let (triage_state, recommended_action) = triage_for(kind, retries_exhausted);
        let logs = vec![
            format!(
                "attempt {} of {} failed: {kind}: {message}",
                job.attempt + 1,
                self.settings.max_attempts
            ),
            format!("idempotency_key={}", job.idempotency_key),
        ];
        let item = DlqItem::new(job.clone(), TerminalError::new(kind, message.clone()), logs);
        let dlq_id = item.dlq_id.clone();
        self.db.dlq_add(&item).await?;
        self.db
            .quarantine_asset(
                &job.asset_id,
                triage_state,
                recommended_action,
                &message,
                job.attempt + 1,
            )
            .await?;
        warn!(
            asset_id = %job.asset_id,
            version_id = %job.version_id,
            %dlq_id,
            kind = %kind,
            triage_state = triage_state.as_str(),
            "job dead-lettered"
        );
        Ok(FailureDisposition::Quarantined { dlq_id })
    }

    /// Operator retry: fresh job at attempt 0 with a new idempotency key
    /// suffix; triage state and last error cleared.
    pub async fn triage_retry(&self, asset_id: &str) -> Result<(), PipelineError> {
        let item = self
            .db
            .dlq_find_by_asset(asset_id)
            .await?
            .ok_or_else(|| {
                PipelineError::NotFound(format!("no DLQ entry for asset {asset_id}"))
            })?;
        let job = item.job.triage_retry();
        self.db.clear_triage(asset_id).await?;
        self.db.record_job(&job).await?;
        self.queue.enqueue(job).await?;
        self.db.dlq_remove(&item.dlq_id).await?;
        info!(asset_id, dlq_id = %item.dlq_id, "operator retry scheduled");
        Ok(())
    }

    /// Operator skip: asset goes terminal FAILED, last error retained, the
    /// DLQ entry is removed.
    pub async fn triage_skip(&self, asset_id: &str) -> Result<(), PipelineError> {
        let item = self.db.dlq_find_by_asset(asset_id).await?;
        self.db.mark_failed(asset_id).await?;
        if let Some(item) = item {
            self.db.dlq_remove(&item.dlq_id).await?;
        }
        info!(asset_id, "asset skipped by operator");
        Ok(())
    }
}
