//! Speech recognition engine contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::models::ExecutionMode;

/// One timed text span from the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrSegment {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    pub speaker: Option<String>,
    /// 0..=1.
    pub confidence: f32,
}

/// Raw transcription output, before chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrResult {
    pub segments: Vec<AsrSegment>,
    pub duration_ms: i64,
    /// Engine that produced the result (may differ from the request when a
    /// backend delegates).
    pub engine: String,
}

/// Per-call transcription options, derived from the job's engine policy.
#[derive(Debug, Clone, Default)]
pub struct TranscribeOptions {
    pub diarization: bool,
    pub execution_mode: ExecutionMode,
    pub language: Option<String>,
    pub content_type: Option<String>,
    pub duration_hint_ms: Option<i64>,
}

/// Static capability declaration for engine selection and validation.
#[derive(Debug, Clone)]
pub struct EngineCapabilities {
    /// Supported container extensions, lowercase.
    pub formats: Vec<String>,
    pub diarization: bool,
    pub max_duration_ms: Option<i64>,
    /// Empty means auto-detect / unrestricted.
    pub languages: Vec<String>,
}

/// A pluggable speech-recognition engine.
///
/// Failures must map onto the pipeline error taxonomy so the retry
/// manager can route them: unsupported media to `MediaFormat`, engine
/// setup problems to `EngineConfig`, saturation to `TransientResource`.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> EngineCapabilities;

    /// Whether the backing binary/service is reachable.
    fn is_available(&self) -> bool {
        true
    }

    /// What to install or configure when `is_available` is false.
    fn availability_hint(&self) -> String {
        String::new()
    }

    async fn transcribe(
        &self,
        media: &[u8],
        opts: &TranscribeOptions,
    ) -> Result<AsrResult, PipelineError>;
}
