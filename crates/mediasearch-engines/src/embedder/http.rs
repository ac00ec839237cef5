//! HTTP embedding backend.
//!
//! Talks to a sentence-transformer style service:
//! `POST {url} {"texts": [...]}` returning `{"embeddings": [[f32; D]], "model": "..."}`.

use async_trait::async_trait;
use mediasearch::ports::Embedder;
use mediasearch::PipelineError;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    model: Option<String>,
}

pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dimension: usize,
    batch_limit: usize,
}

impl HttpEmbedder {
    pub fn new(url: impl Into<String>, dimension: usize, batch_limit: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            model: "remote".to_string(),
            dimension,
            batch_limit,
        }
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let response = self
            .client
            .post(&self.url)
            .json(&EmbedRequest { texts })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    PipelineError::TransientNetwork(format!("embedder unreachable: {e}"))
                } else {
                    PipelineError::TransientNetwork(format!("embedder request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => PipelineError::PermanentDownstream(format!(
                    "embedder rejected credentials ({status}): {body}"
                )),
                429 => PipelineError::TransientNetwork(format!(
                    "embedder rate limited: {body}"
                )),
                400 | 422 => PipelineError::EngineConfig(format!(
                    "embedder rejected request ({status}): {body}"
                )),
                _ => PipelineError::TransientNetwork(format!(
                    "embedder returned {status}: {body}"
                )),
            });
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            PipelineError::EngineConfig(format!("unparseable embedder response: {e}"))
        })?;
        if let Some(model) = &parsed.model {
            debug!(model, "embedder model");
        }

        if parsed.embeddings.len() != texts.len() {
            return Err(PipelineError::EngineConfig(format!(
                "embedder returned {} vectors for {} texts",
                parsed.embeddings.len(),
                texts.len()
            )));
        }
        for vector in &parsed.embeddings {
            if vector.len() != self.dimension {
                return Err(PipelineError::EngineConfig(format!(
                    "embedder returned {} dims, expected {}",
                    vector.len(),
                    self.dimension
                )));
            }
        }
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let texts = [text.to_string()];
        let mut vectors = self.request(&texts).await?;
        vectors
            .pop()
            .ok_or_else(|| PipelineError::EngineConfig("embedder returned no vector".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_limit.max(1)) {
            out.extend(self.request(chunk).await?);
        }
        Ok(out)
    }
}
