//! Transcript segments and their embeddings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChunkingStrategy, PublishState};

/// Row-level visibility shares the version publish-state vocabulary; only
/// ACTIVE rows are search-visible.
pub type Visibility = PublishState;

/// A timed text chunk of a version's transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub segment_id: String,
    pub asset_id: String,
    pub version_id: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    pub speaker: Option<String>,
    /// 0..=1.
    pub confidence: f32,
    pub visibility: Visibility,
    pub chunking_strategy: ChunkingStrategy,
    pub created_at: DateTime<Utc>,
}

impl TranscriptSegment {
    /// Segment id for the `index`-th chunk of a version.
    pub fn segment_id_for(version_id: &str, index: usize) -> String {
        format!("{version_id}_seg_{index}")
    }
}

/// A fixed-dimension float vector representing a segment's meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEmbedding {
    pub embedding_id: String,
    pub asset_id: String,
    pub version_id: String,
    pub segment_id: String,
    pub vector: Vec<f32>,
    pub model: String,
    pub dimension: usize,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

impl TranscriptEmbedding {
    pub fn new(segment: &TranscriptSegment, vector: Vec<f32>, model: impl Into<String>) -> Self {
        Self {
            embedding_id: uuid::Uuid::new_v4().to_string(),
            asset_id: segment.asset_id.clone(),
            version_id: segment.version_id.clone(),
            segment_id: segment.segment_id.clone(),
            dimension: vector.len(),
            vector,
            model: model.into(),
            visibility: segment.visibility,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_id_format() {
        assert_eq!(
            TranscriptSegment::segment_id_for("v_abc", 3),
            "v_abc_seg_3"
        );
    }

    #[test]
    fn embedding_mirrors_segment_binding() {
        let seg = TranscriptSegment {
            segment_id: "v_1_seg_0".into(),
            asset_id: "a1".into(),
            version_id: "v_1".into(),
            start_ms: 0,
            end_ms: 1000,
            text: "hello".into(),
            speaker: None,
            confidence: 0.9,
            visibility: Visibility::Staging,
            chunking_strategy: ChunkingStrategy::Sentence,
            created_at: Utc::now(),
        };
        let emb = TranscriptEmbedding::new(&seg, vec![0.0; 384], "local-hash");
        assert_eq!(emb.segment_id, seg.segment_id);
        assert_eq!(emb.version_id, seg.version_id);
        assert_eq!(emb.visibility, seg.visibility);
        assert_eq!(emb.dimension, 384);
    }
}
