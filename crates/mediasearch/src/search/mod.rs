//! Query layer: keyword, semantic, and hybrid search.
//!
//! All three modes ride on the repository's search primitives, which
//! enforce the hard filters (ACTIVE visibility, current-version binding,
//! no tombstones). This layer validates requests, embeds query text for
//! the semantic path, and fuses hybrid results.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::ports::{Embedder, MediaDatabase, SegmentHit};

/// Hard upper limit on page size.
pub const MAX_LIMIT: usize = 100;
pub const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Keyword,
    Semantic,
    Hybrid,
}

impl Default for SearchMode {
    fn default() -> Self {
        Self::Keyword
    }
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "keyword" => Some(Self::Keyword),
            "semantic" => Some(Self::Semantic),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

/// How a hit matched the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Keyword,
    Semantic,
    Hybrid,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub mode: SearchMode,
    pub bucket: Option<String>,
    pub speaker: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: SearchMode::Keyword,
            bucket: None,
            speaker: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub asset_id: String,
    pub version_id: String,
    pub segment_id: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub snippet: String,
    pub score: f32,
    pub match_type: MatchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    pub bucket: String,
    pub object_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    #[serde(rename = "type")]
    pub mode: SearchMode,
    pub total: usize,
    pub results: Vec<SearchHit>,
}

/// Search facade over the database port and the embedder.
pub struct SearchService {
    db: Arc<dyn MediaDatabase>,
    embedder: Arc<dyn Embedder>,
    keyword_weight: f32,
    semantic_weight: f32,
}

impl SearchService {
    pub fn new(
        db: Arc<dyn MediaDatabase>,
        embedder: Arc<dyn Embedder>,
        keyword_weight: f32,
        semantic_weight: f32,
    ) -> Self {
        Self {
            db,
            embedder,
            keyword_weight,
            semantic_weight,
        }
    }

    pub async fn search(&self, req: &SearchRequest) -> Result<SearchResponse, PipelineError> {
        if req.query.trim().is_empty() {
            return Err(PipelineError::InvalidInput("query must not be empty".into()));
        }
        if req.limit == 0 || req.limit > MAX_LIMIT {
            return Err(PipelineError::InvalidInput(format!(
                "limit must be in 1..={MAX_LIMIT}"
            )));
        }

        // Fetch the page plus everything before it, then slice: the hybrid
        // fusion and the primitives agree on what "offset" means. The
        // reported total is counted separately, unbounded by the window.
        let pool_size = req.offset + req.limit;
        let bucket = req.bucket.as_deref();
        let speaker = req.speaker.as_deref();

        let (pool, total): (Vec<SearchHit>, usize) = match req.mode {
            SearchMode::Keyword => {
                let total = self
                    .db
                    .count_matches(Some(&req.query), None, bucket, speaker)
                    .await?;
                let pool = self
                    .db
                    .keyword_search(&req.query, bucket, speaker, pool_size, 0)
                    .await?
                    .into_iter()
                    .map(|h| to_hit(h, MatchType::Keyword))
                    .collect();
                (pool, total)
            }
            SearchMode::Semantic => {
                let vector = self.embed_query(&req.query).await?;
                let total = self
                    .db
                    .count_matches(None, Some(&vector), bucket, speaker)
                    .await?;
                let pool = self
                    .db
                    .semantic_search(&vector, bucket, speaker, pool_size, 0)
                    .await?
                    .into_iter()
                    .map(|h| to_hit(h, MatchType::Semantic))
                    .collect();
                (pool, total)
            }
            SearchMode::Hybrid => {
                let vector = self.embed_query(&req.query).await?;
                let total = self
                    .db
                    .count_matches(Some(&req.query), Some(&vector), bucket, speaker)
                    .await?;
                let keyword = self
                    .db
                    .keyword_search(&req.query, bucket, speaker, pool_size, 0)
                    .await?;
                let semantic = self
                    .db
                    .semantic_search(&vector, bucket, speaker, pool_size, 0)
                    .await?;
                let pool =
                    fuse_hybrid(keyword, semantic, self.keyword_weight, self.semantic_weight);
                (pool, total)
            }
        };

        let results: Vec<SearchHit> = pool.into_iter().skip(req.offset).take(req.limit).collect();

        Ok(SearchResponse {
            query: req.query.clone(),
            mode: req.mode,
            total,
            results,
        })
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, PipelineError> {
        let vector = self.embedder.embed(query).await?;
        if vector.len() != self.embedder.dimension() {
            return Err(PipelineError::Internal(format!(
                "embedder returned {} dims, expected {}",
                vector.len(),
                self.embedder.dimension()
            )));
        }
        Ok(vector)
    }
}

fn to_hit(hit: SegmentHit, match_type: MatchType) -> SearchHit {
    SearchHit {
        asset_id: hit.asset_id,
        version_id: hit.version_id,
        segment_id: hit.segment_id,
        start_ms: hit.start_ms,
        end_ms: hit.end_ms,
        snippet: hit.text,
        score: hit.score,
        match_type,
        speaker: hit.speaker,
        bucket: hit.bucket,
        object_key: hit.object_key,
    }
}

/// Fuse keyword and semantic hits per segment id.
///
/// Combined score is `Wk * K + Ws * S`; a segment present in only one
/// source contributes only that term. Ties break on raw semantic score,
/// then raw keyword score, then segment id.
pub fn fuse_hybrid(
    keyword: Vec<SegmentHit>,
    semantic: Vec<SegmentHit>,
    keyword_weight: f32,
    semantic_weight: f32,
) -> Vec<SearchHit> {
    struct Fused {
        hit: SegmentHit,
        keyword_score: Option<f32>,
        semantic_score: Option<f32>,
    }

    let mut fused: Vec<Fused> = Vec::with_capacity(keyword.len() + semantic.len());
    for hit in keyword {
        fused.push(Fused {
            keyword_score: Some(hit.score),
            semantic_score: None,
            hit,
        });
    }
    for hit in semantic {
        match fused.iter_mut().find(|f| f.hit.segment_id == hit.segment_id) {
            Some(existing) => existing.semantic_score = Some(hit.score),
            None => fused.push(Fused {
                keyword_score: None,
                semantic_score: Some(hit.score),
                hit,
            }),
        }
    }

    let combined = |f: &Fused| {
        keyword_weight * f.keyword_score.unwrap_or(0.0)
            + semantic_weight * f.semantic_score.unwrap_or(0.0)
    };

    fused.sort_by(|a, b| {
        combined(b)
            .partial_cmp(&combined(a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.semantic_score
                    .unwrap_or(0.0)
                    .partial_cmp(&a.semantic_score.unwrap_or(0.0))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| {
                b.keyword_score
                    .unwrap_or(0.0)
                    .partial_cmp(&a.keyword_score.unwrap_or(0.0))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.hit.segment_id.cmp(&b.hit.segment_id))
    });

    fused
        .into_iter()
        .map(|f| {
            let match_type = match (f.keyword_score, f.semantic_score) {
                (Some(_), Some(_)) => MatchType::Hybrid,
                (Some(_), None) => MatchType::Keyword,
                (None, Some(_)) => MatchType::Semantic,
                (None, None) => unreachable!("fused hit with no source"),
            };
            let score = keyword_weight * f.keyword_score.unwrap_or(0.0)
                + semantic_weight * f.semantic_score.unwrap_or(0.0);
            let mut hit = to_hit(f.hit, match_type);
            hit.score = score;
            hit
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn segment_hit(segment_id: &str, score: f32) -> SegmentHit {
        SegmentHit {
            asset_id: "a1".into(),
            version_id: "v_1".into(),
            segment_id: segment_id.into(),
            start_ms: 0,
            end_ms: 1000,
            text: "text".into(),
            speaker: None,
            score,
            created_at: Utc::now(),
            bucket: "media".into(),
            object_key: "clip.wav".into(),
        }
    }

    #[test]
    fn hybrid_ranks_dual_source_first() {
        // A: keyword only, B: semantic only, C: both.
        let keyword = vec![segment_hit("seg_a", 0.8), segment_hit("seg_c", 0.6)];
        let semantic = vec![segment_hit("seg_b", 0.7), segment_hit("seg_c", 0.9)];
        let fused = fuse_hybrid(keyword, semantic, 0.5, 0.5);

        assert_eq!(fused[0].segment_id, "seg_c");
        assert_eq!(fused[0].match_type, MatchType::Hybrid);
        assert!((fused[0].score - (0.5 * 0.6 + 0.5 * 0.9)).abs() < 1e-6);

        // A scores 0.4, B scores 0.35.
        assert_eq!(fused[1].segment_id, "seg_a");
        assert_eq!(fused[1].match_type, MatchType::Keyword);
        assert_eq!(fused[2].segment_id, "seg_b");
        assert_eq!(fused[2].match_type, MatchType::Semantic);
    }

    #[test]
    fn hybrid_tiebreak_prefers_semantic_then_keyword_then_id() {
        // Equal combined scores.
        let keyword = vec![segment_hit("seg_x", 0.8)];
        let semantic = vec![segment_hit("seg_y", 0.8)];
        let fused = fuse_hybrid(keyword, semantic, 0.5, 0.5);
        // seg_y wins: higher raw semantic score on equal combined.
        assert_eq!(fused[0].segment_id, "seg_y");

        // Fully identical scores fall back to id order.
        let keyword = vec![segment_hit("seg_b", 0.5), segment_hit("seg_a", 0.5)];
        let fused = fuse_hybrid(keyword, Vec::new(), 1.0, 0.0);
        assert_eq!(fused[0].segment_id, "seg_a");
        assert_eq!(fused[1].segment_id, "seg_b");
    }

    #[test]
    fn single_source_contributes_alone() {
        let semantic = vec![segment_hit("seg_s", 1.0)];
        let fused = fuse_hybrid(Vec::new(), semantic, 0.3, 0.7);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 0.7).abs() < 1e-6);
        assert_eq!(fused[0].match_type, MatchType::Semantic);
    }

    #[test]
    fn mode_parse() {
        assert_eq!(SearchMode::from_str("keyword"), Some(SearchMode::Keyword));
        assert_eq!(SearchMode::from_str("hybrid"), Some(SearchMode::Hybrid));
        assert_eq!(SearchMode::from_str("fuzzy"), None);
    }
}
