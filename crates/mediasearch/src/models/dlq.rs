//! Dead-letter queue items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

use super::TranscriptionJob;

/// The classified failure that parked a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl TerminalError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: kind.as_str().to_string(),
            message: message.into(),
            retryable: kind.is_retryable(),
        }
    }
}

/// A parked failed job with diagnostics, keyed for operator triage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqItem {
    pub dlq_id: String,
    pub job: TranscriptionJob,
    pub asset_id: String,
    pub version_id: String,
    pub error: TerminalError,
    /// Human-readable attempt history.
    pub logs: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl DlqItem {
    pub fn new(job: TranscriptionJob, error: TerminalError, logs: Vec<String>) -> Self {
        Self {
            dlq_id: uuid::Uuid::new_v4().to_string(),
            asset_id: job.asset_id.clone(),
            version_id: job.version_id.clone(),
            job,
            error,
            logs,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EnginePolicy;

    #[test]
    fn dlq_item_snapshots_job_identity() {
        let job = TranscriptionJob::new("a1", "v_1", EnginePolicy::new("whisper", 600), 4);
        let item = DlqItem::new(
            job.clone(),
            TerminalError::new(ErrorKind::MediaFormat, "unsupported codec"),
            vec!["attempt 4: MEDIA_FORMAT".into()],
        );
        assert_eq!(item.asset_id, job.asset_id);
        assert_eq!(item.version_id, job.version_id);
        assert_eq!(item.error.code, "MEDIA_FORMAT");
        assert!(!item.error.retryable);
    }
}
