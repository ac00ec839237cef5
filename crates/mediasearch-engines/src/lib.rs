//! Speech recognition and embedding backends.
//!
//! Engines implement the `SpeechEngine` and `Embedder` ports from the core
//! crate. Selection happens here so the pipeline and CLI stay
//! backend-agnostic.

pub mod embedder;
pub mod mock;
pub mod whisper;

use std::sync::Arc;

use mediasearch::config::Settings;
use mediasearch::ports::{Embedder, SpeechEngine};
use mediasearch::PipelineError;

pub use embedder::{HashEmbedder, HttpEmbedder};
pub use mock::MockSpeechEngine;
pub use whisper::{WhisperConfig, WhisperEngine};

/// Construct the configured speech engine.
pub fn speech_engine_from_settings(
    settings: &Settings,
) -> Result<Arc<dyn SpeechEngine>, PipelineError> {
    match settings.asr_engine.as_str() {
        "whisper" => Ok(Arc::new(WhisperEngine::new())),
        other => Err(PipelineError::EngineConfig(format!(
            "unknown ASR engine `{other}`"
        ))),
    }
}

/// Construct the configured embedder: remote HTTP service when a URL is
/// set, otherwise the deterministic local hash embedder.
pub fn embedder_from_settings(settings: &Settings) -> Arc<dyn Embedder> {
    match settings.embedder_url.as_deref() {
        Some(url) => Arc::new(HttpEmbedder::new(
            url,
            settings.embedding_dimension,
            settings.embed_batch_size,
        )),
        None => Arc::new(HashEmbedder::new(settings.embedding_dimension)),
    }
}
