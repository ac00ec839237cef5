//! Transcription job journal.
//!
//! Every job the queue delivers leaves a row here; the idempotency-key
//! uniqueness makes duplicate enqueues visible as no-ops.

use chrono::Utc;
use rusqlite::params;

use crate::error::PipelineError;
use crate::models::{JobStatus, TranscriptionJob};

use super::SqliteRepository;

impl SqliteRepository {
    pub(crate) fn record_job_sync(&self, job: &TranscriptionJob) -> Result<(), PipelineError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO transcription_jobs
             (job_id, asset_id, version_id, engine_policy, attempt,
              idempotency_key, status, enqueued_at, scheduled_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (idempotency_key) DO NOTHING",
            params![
                job.job_id,
                job.asset_id,
                job.version_id,
                serde_json::to_string(&job.engine_policy)?,
                job.attempt as i64,
                job.idempotency_key,
                JobStatus::Queued.as_str(),
                job.enqueued_at.to_rfc3339(),
                job.scheduled_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub(crate) fn mark_job_running_sync(&self, job_id: &str) -> Result<(), PipelineError> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE transcription_jobs SET status = ?, started_at = ? WHERE job_id = ?",
            params![
                JobStatus::Running.as_str(),
                Utc::now().to_rfc3339(),
                job_id
            ],
        )?;
        Ok(())
    }

    pub(crate) fn mark_job_finished_sync(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<(), PipelineError> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE transcription_jobs
             SET status = ?, completed_at = ?, last_error = ?
             WHERE job_id = ?",
            params![status.as_str(), Utc::now().to_rfc3339(), error, job_id],
        )?;
        Ok(())
    }
}
