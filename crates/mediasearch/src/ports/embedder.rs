//! Embedding model contract.

use async_trait::async_trait;

use crate::error::PipelineError;

/// Text-to-vector embedding backend. Every returned vector has exactly
/// `dimension()` float32 values.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Max texts per `embed_batch` call.
    fn batch_limit(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;
}
