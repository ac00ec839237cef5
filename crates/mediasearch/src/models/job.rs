//! Transcription job model and engine policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the ASR engine should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Local,
    Remote,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Local
    }
}

/// Algorithm selecting segment boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    Sentence,
    FixedWindow,
}

impl ChunkingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sentence => "sentence",
            Self::FixedWindow => "fixed_window",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sentence" => Some(Self::Sentence),
            "fixed_window" => Some(Self::FixedWindow),
            _ => None,
        }
    }
}

/// Per-job transcription configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnginePolicy {
    pub engine: String,
    #[serde(default)]
    pub diarization_enabled: bool,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    /// Media longer than this falls back to fixed-window chunking.
    pub compute_threshold_seconds: u32,
    #[serde(default)]
    pub force_chunking_strategy: Option<ChunkingStrategy>,
    #[serde(default)]
    pub language: Option<String>,
}

impl EnginePolicy {
    pub fn new(engine: impl Into<String>, compute_threshold_seconds: u32) -> Self {
        Self {
            engine: engine.into(),
            diarization_enabled: false,
            execution_mode: ExecutionMode::Local,
            compute_threshold_seconds,
            force_chunking_strategy: None,
            language: None,
        }
    }
}

/// Lifecycle state journaled into the `transcription_jobs` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A queued unit of transcription work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionJob {
    pub job_id: String,
    pub asset_id: String,
    pub version_id: String,
    pub engine_policy: EnginePolicy,
    pub attempt: u32,
    /// `{asset_id}:{version_id}:{attempt}`; duplicate enqueues are no-ops.
    pub idempotency_key: String,
    pub enqueued_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
}

impl TranscriptionJob {
    pub fn new(
        asset_id: impl Into<String>,
        version_id: impl Into<String>,
        engine_policy: EnginePolicy,
        attempt: u32,
    ) -> Self {
        let asset_id = asset_id.into();
        let version_id = version_id.into();
        let now = Utc::now();
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            idempotency_key: format!("{asset_id}:{version_id}:{attempt}"),
            asset_id,
            version_id,
            engine_policy,
            attempt,
            enqueued_at: now,
            scheduled_at: now,
        }
    }

    /// Follow-up job for a retry, with the attempt counter advanced.
    pub fn next_attempt(&self) -> Self {
        let mut job = Self::new(
            self.asset_id.clone(),
            self.version_id.clone(),
            self.engine_policy.clone(),
            self.attempt + 1,
        );
        job.enqueued_at = Utc::now();
        job
    }

    /// Fresh operator-initiated job with a new idempotency key suffix so it
    /// does not collide with the exhausted attempt chain.
    pub fn triage_retry(&self) -> Self {
        let mut job = Self::new(
            self.asset_id.clone(),
            self.version_id.clone(),
            self.engine_policy.clone(),
            0,
        );
        job.idempotency_key = format!(
            "{}:{}:triage:{}",
            self.asset_id,
            self.version_id,
            &job.job_id[..8]
        );
        job
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_shape() {
        let job = TranscriptionJob::new("a1", "v_1", EnginePolicy::new("whisper", 600), 0);
        assert_eq!(job.idempotency_key, "a1:v_1:0");
    }

    #[test]
    fn next_attempt_increments_and_rekeys() {
        let job = TranscriptionJob::new("a1", "v_1", EnginePolicy::new("whisper", 600), 1);
        let next = job.next_attempt();
        assert_eq!(next.attempt, 2);
        assert_eq!(next.idempotency_key, "a1:v_1:2");
        assert_ne!(next.job_id, job.job_id);
    }

    #[test]
    fn triage_retry_uses_fresh_suffix() {
        let job = TranscriptionJob::new("a1", "v_1", EnginePolicy::new("whisper", 600), 4);
        let retried = job.triage_retry();
        assert_eq!(retried.attempt, 0);
        assert!(retried.idempotency_key.starts_with("a1:v_1:triage:"));
        assert_ne!(retried.idempotency_key, "a1:v_1:0");
    }

    #[test]
    fn engine_policy_serializes_with_defaults() {
        let json = r#"{"engine":"whisper","compute_threshold_seconds":600}"#;
        let policy: EnginePolicy = serde_json::from_str(json).unwrap();
        assert!(!policy.diarization_enabled);
        assert_eq!(policy.execution_mode, ExecutionMode::Local);
        assert!(policy.force_chunking_strategy.is_none());
    }
}
