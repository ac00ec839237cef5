//! Scripted speech engine for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use mediasearch::ports::{AsrResult, EngineCapabilities, SpeechEngine, TranscribeOptions};
use mediasearch::{ErrorKind, PipelineError};

/// One scripted response.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Ok(AsrResult),
    Err(ErrorKind, String),
}

/// Speech engine that replays a script, in order. Once the script is
/// drained it keeps returning the last entry (or an empty result when the
/// script was empty), so retries behave predictably.
pub struct MockSpeechEngine {
    script: Mutex<VecDeque<ScriptedResponse>>,
    last: Mutex<Option<ScriptedResponse>>,
    calls: AtomicUsize,
}

impl MockSpeechEngine {
    pub fn with_script(script: Vec<ScriptedResponse>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always succeed with the given result.
    pub fn always(result: AsrResult) -> Self {
        Self::with_script(vec![ScriptedResponse::Ok(result)])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn error_for(kind: ErrorKind, message: String) -> PipelineError {
        match kind {
            ErrorKind::MediaFormat => PipelineError::MediaFormat(message),
            ErrorKind::EngineConfig => PipelineError::EngineConfig(message),
            ErrorKind::PermanentDownstream => PipelineError::PermanentDownstream(message),
            ErrorKind::TransientResource => PipelineError::TransientResource(message),
            ErrorKind::Timeout => PipelineError::Timeout { elapsed_secs: 0 },
            _ => PipelineError::TransientNetwork(message),
        }
    }
}

#[async_trait]
impl SpeechEngine for MockSpeechEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            formats: ["wav", "mp3", "aac", "flac", "mp4", "mov", "mxf"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            diarization: true,
            max_duration_ms: None,
            languages: Vec::new(),
        }
    }

    async fn transcribe(
        &self,
        _media: &[u8],
        _opts: &TranscribeOptions,
    ) -> Result<AsrResult, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = {
            let mut script = self.script.lock().expect("script lock");
            match script.pop_front() {
                Some(response) => {
                    *self.last.lock().expect("last lock") = Some(response.clone());
                    response
                }
                None => self
                    .last
                    .lock()
                    .expect("last lock")
                    .clone()
                    .unwrap_or(ScriptedResponse::Ok(AsrResult {
                        segments: Vec::new(),
                        duration_ms: 0,
                        engine: "mock".into(),
                    })),
            }
        };
        match next {
            ScriptedResponse::Ok(result) => Ok(result),
            ScriptedResponse::Err(kind, message) => Err(Self::error_for(kind, message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediasearch::ports::AsrSegment;

    fn one_segment() -> AsrResult {
        AsrResult {
            segments: vec![AsrSegment {
                start_ms: 0,
                end_ms: 1000,
                text: "hello world".into(),
                speaker: None,
                confidence: 0.95,
            }],
            duration_ms: 1000,
            engine: "mock".into(),
        }
    }

    #[tokio::test]
    async fn script_plays_in_order_then_repeats_last() {
        let engine = MockSpeechEngine::with_script(vec![
            ScriptedResponse::Err(ErrorKind::TransientNetwork, "reset".into()),
            ScriptedResponse::Ok(one_segment()),
        ]);
        let opts = TranscribeOptions::default();

        assert!(engine.transcribe(b"x", &opts).await.is_err());
        assert!(engine.transcribe(b"x", &opts).await.is_ok());
        // Drained: repeats the last response.
        assert!(engine.transcribe(b"x", &opts).await.is_ok());
        assert_eq!(engine.call_count(), 3);
    }
}
