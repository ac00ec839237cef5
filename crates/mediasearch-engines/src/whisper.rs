//! Whisper audio/video transcription backend.
//!
//! Shells out to the whisper CLI (from the openai-whisper Python package),
//! asking for JSON output and mapping its timed segments onto the ASR
//! port. Whisper does not diarize; speaker labels are always absent.

use std::path::PathBuf;

use async_trait::async_trait;
use mediasearch::classify::classify_external;
use mediasearch::models::ExecutionMode;
use mediasearch::ports::{
    AsrResult, AsrSegment, EngineCapabilities, SpeechEngine, TranscribeOptions,
};
use mediasearch::{ErrorKind, PipelineError};
use serde::Deserialize;
use tracing::{debug, warn};

/// Whisper backend configuration.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Whisper model to use (tiny, base, small, medium, large, turbo).
    pub model: String,
    /// Path to whisper binary (if not in PATH).
    pub binary_path: Option<PathBuf>,
    /// Additional CLI arguments.
    pub extra_args: Vec<String>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model: "base".to_string(),
            binary_path: None,
            extra_args: Vec::new(),
        }
    }
}

/// Whisper transcription backend.
#[derive(Debug, Default)]
pub struct WhisperEngine {
    config: WhisperConfig,
}

impl WhisperEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: WhisperConfig) -> Self {
        Self { config }
    }

    fn whisper_binary(&self) -> &str {
        self.config
            .binary_path
            .as_ref()
            .and_then(|p| p.to_str())
            .unwrap_or("whisper")
    }
}

/// Whisper's JSON output file.
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    segments: Vec<WhisperSegment>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    avg_logprob: Option<f64>,
}

/// Convert whisper's JSON to the ASR port shape.
pub(crate) fn parse_whisper_output(raw: &str, engine: &str) -> Result<AsrResult, PipelineError> {
    let output: WhisperOutput = serde_json::from_str(raw)
        .map_err(|e| PipelineError::EngineConfig(format!("unparseable whisper output: {e}")))?;
    if let Some(language) = &output.language {
        debug!(language, "whisper detected language");
    }
    let segments: Vec<AsrSegment> = output
        .segments
        .into_iter()
        .map(|seg| AsrSegment {
            start_ms: (seg.start * 1000.0) as i64,
            end_ms: (seg.end * 1000.0) as i64,
            text: seg.text.trim().to_string(),
            speaker: None,
            confidence: seg
                .avg_logprob
                .map(|lp| lp.exp().clamp(0.0, 1.0) as f32)
                .unwrap_or(1.0),
        })
        .filter(|seg| !seg.text.is_empty())
        .collect();
    let duration_ms = segments.iter().map(|s| s.end_ms).max().unwrap_or(0);
    Ok(AsrResult {
        segments,
        duration_ms,
        engine: engine.to_string(),
    })
}

fn engine_error(kind: ErrorKind, message: String) -> PipelineError {
    match kind {
        ErrorKind::MediaFormat => PipelineError::MediaFormat(message),
        ErrorKind::EngineConfig => PipelineError::EngineConfig(message),
        ErrorKind::PermanentDownstream => PipelineError::PermanentDownstream(message),
        ErrorKind::TransientResource => PipelineError::TransientResource(message),
        _ => PipelineError::TransientNetwork(message),
    }
}

#[async_trait]
impl SpeechEngine for WhisperEngine {
    fn name(&self) -> &str {
        "whisper"
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            formats: ["wav", "mp3", "aac", "flac", "mp4", "mov", "mxf"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            diarization: false,
            max_duration_ms: None,
            languages: Vec::new(),
        }
    }

    fn is_available(&self) -> bool {
        std::process::Command::new(self.whisper_binary())
            .arg("--help")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn availability_hint(&self) -> String {
        "Install whisper: pip install openai-whisper".to_string()
    }

    async fn transcribe(
        &self,
        media: &[u8],
        opts: &TranscribeOptions,
    ) -> Result<AsrResult, PipelineError> {
        if opts.diarization {
            warn!("whisper does not support diarization; speaker labels will be absent");
        }
        if opts.execution_mode == ExecutionMode::Remote {
            return Err(PipelineError::EngineConfig(
                "whisper backend only supports local execution".into(),
            ));
        }

        let temp = tempfile::TempDir::new()?;
        let extension = opts
            .content_type
            .as_deref()
            .and_then(extension_for_content_type)
            .unwrap_or("wav");
        let input = temp.path().join(format!("input.{extension}"));
        tokio::fs::write(&input, media).await?;

        let mut cmd = tokio::process::Command::new(self.whisper_binary());
        cmd.arg(&input)
            .arg("--model")
            .arg(&self.config.model)
            .arg("--output_format")
            .arg("json")
            .arg("--output_dir")
            .arg(temp.path());
        if let Some(language) = &opts.language {
            cmd.arg("--language").arg(language);
        }
        for arg in &self.config.extra_args {
            cmd.arg(arg);
        }

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::EngineConfig(format!(
                    "whisper binary `{}` not found ({})",
                    self.whisper_binary(),
                    self.availability_hint()
                ))
            } else {
                PipelineError::TransientResource(format!("failed to run whisper: {e}"))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let kind = classify_external(None, &stderr);
            return Err(engine_error(
                kind,
                format!("whisper exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let json_path = temp.path().join("input.json");
        let raw = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            PipelineError::EngineConfig(format!("whisper produced no JSON output: {e}"))
        })?;
        parse_whisper_output(&raw, self.name())
    }
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    match content_type {
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/aac" => Some("aac"),
        "audio/flac" => Some("flac"),
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        "application/mxf" => Some("mxf"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whisper_json() {
        let raw = r#"{
            "text": " Hello world. How are you?",
            "segments": [
                {"id": 0, "seek": 0, "start": 0.0, "end": 2.5,
                 "text": " Hello world.", "avg_logprob": -0.105},
                {"id": 1, "seek": 0, "start": 2.5, "end": 4.0,
                 "text": " How are you?", "avg_logprob": -0.223}
            ],
            "language": "en"
        }"#;
        let result = parse_whisper_output(raw, "whisper").unwrap();
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.segments[0].start_ms, 0);
        assert_eq!(result.segments[0].end_ms, 2500);
        assert_eq!(result.segments[0].text, "Hello world.");
        assert!(result.segments[0].confidence > 0.8);
        assert!(result.segments[0].speaker.is_none());
        assert_eq!(result.duration_ms, 4000);
    }

    #[test]
    fn empty_segments_is_valid() {
        let result = parse_whisper_output(r#"{"segments": []}"#, "whisper").unwrap();
        assert!(result.segments.is_empty());
        assert_eq!(result.duration_ms, 0);
    }

    #[test]
    fn garbage_output_is_engine_config_error() {
        let err = parse_whisper_output("not json", "whisper").unwrap_err();
        assert!(matches!(err, PipelineError::EngineConfig(_)));
    }

    #[test]
    fn content_type_extension_mapping() {
        assert_eq!(extension_for_content_type("audio/wav"), Some("wav"));
        assert_eq!(extension_for_content_type("video/quicktime"), Some("mov"));
        assert_eq!(extension_for_content_type("image/png"), None);
    }
}
