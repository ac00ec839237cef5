//! Search primitives.
//!
//! Candidate rows come from SQL with the hard visibility filters applied
//! (ACTIVE rows of the asset's current version, asset not tombstoned);
//! scoring happens in Rust since SQLite has no ranking or vector distance
//! functions.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Row};
use tracing::warn;

use crate::error::PipelineError;
use crate::models::PublishState;
use crate::ports::SegmentHit;

use super::transcripts::blob_to_vector;
use super::{parse_datetime, SqliteRepository};

const HIT_COLUMNS: &str = "s.asset_id, s.version_id, s.segment_id, s.start_ms, s.end_ms, \
     s.text, s.speaker, s.created_at, a.bucket, a.object_key";

fn row_to_hit(row: &Row<'_>) -> rusqlite::Result<SegmentHit> {
    Ok(SegmentHit {
        asset_id: row.get(0)?,
        version_id: row.get(1)?,
        segment_id: row.get(2)?,
        start_ms: row.get(3)?,
        end_ms: row.get(4)?,
        text: row.get(5)?,
        speaker: row.get(6)?,
        score: 0.0,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        bucket: row.get(8)?,
        object_key: row.get(9)?,
    })
}

/// Lowercased whitespace tokens of a user query.
pub(crate) fn tokenize(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Occurrence-density keyword score in [0, 1]: matched characters over
/// text length. Any-match is deliberately NOT flattened to 1.0 so ranking
/// survives hybrid fusion.
pub(crate) fn keyword_score(text: &str, tokens: &[String]) -> f32 {
    let lower = text.to_lowercase();
    let text_len = lower.chars().count();
    if text_len == 0 {
        return 0.0;
    }
    let mut matched_chars = 0usize;
    for token in tokens {
        let occurrences = lower.matches(token.as_str()).count();
        matched_chars += occurrences * token.chars().count();
    }
    (matched_chars as f32 / text_len as f32).clamp(0.0, 1.0)
}

/// Cosine distance in [0, 2]; zero-norm vectors are maximally distant.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

impl SqliteRepository {
    pub(crate) fn keyword_search_sync(
        &self,
        query: &str,
        bucket: Option<&str>,
        speaker: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SegmentHit>, PipelineError> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT {HIT_COLUMNS}
             FROM transcript_segments s
             JOIN media_assets a ON a.asset_id = s.asset_id
             WHERE s.visibility = ?
               AND a.tombstone = 0
               AND a.current_version_id = s.version_id"
        );
        let mut params: Vec<Value> = vec![Value::from(PublishState::Active.as_str().to_string())];

        if let Some(bucket) = bucket {
            sql.push_str(" AND a.bucket = ?");
            params.push(Value::from(bucket.to_string()));
        }
        if let Some(speaker) = speaker {
            sql.push_str(" AND s.speaker = ?");
            params.push(Value::from(speaker.to_string()));
        }

        sql.push_str(" AND (");
        for (i, token) in tokens.iter().enumerate() {
            if i > 0 {
                sql.push_str(" OR ");
            }
            sql.push_str("LOWER(s.text) LIKE ?");
            params.push(Value::from(format!("%{token}%")));
        }
        sql.push(')');

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut hits = stmt
            .query_map(params_from_iter(params), row_to_hit)?
            .collect::<Result<Vec<_>, _>>()?;

        for hit in &mut hits {
            hit.score = keyword_score(&hit.text, &tokens);
        }
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.segment_id.cmp(&b.segment_id))
        });

        Ok(hits.into_iter().skip(offset).take(limit).collect())
    }

    pub(crate) fn semantic_search_sync(
        &self,
        vector: &[f32],
        bucket: Option<&str>,
        speaker: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SegmentHit>, PipelineError> {
        if vector.is_empty() {
            return Err(PipelineError::InvalidInput(
                "semantic search requires a query vector".into(),
            ));
        }

        let mut sql = format!(
            "SELECT {HIT_COLUMNS}, e.embedding, e.dimension
             FROM transcript_embeddings e
             JOIN transcript_segments s
               ON s.asset_id = e.asset_id
              AND s.version_id = e.version_id
              AND s.segment_id = e.segment_id
             JOIN media_assets a ON a.asset_id = e.asset_id
             WHERE e.visibility = ?
               AND a.tombstone = 0
               AND a.current_version_id = e.version_id"
        );
        let mut params: Vec<Value> = vec![Value::from(PublishState::Active.as_str().to_string())];

        if let Some(bucket) = bucket {
            sql.push_str(" AND a.bucket = ?");
            params.push(Value::from(bucket.to_string()));
        }
        if let Some(speaker) = speaker {
            sql.push_str(" AND s.speaker = ?");
            params.push(Value::from(speaker.to_string()));
        }

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                let hit = row_to_hit(row)?;
                let blob: Vec<u8> = row.get(10)?;
                let dimension: i64 = row.get(11)?;
                Ok((hit, blob, dimension))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut scored: Vec<(f32, SegmentHit)> = Vec::with_capacity(rows.len());
        for (mut hit, blob, dimension) in rows {
            let embedded = blob_to_vector(&blob);
            if embedded.len() != vector.len() || embedded.len() != dimension as usize {
                warn!(
                    segment_id = %hit.segment_id,
                    stored = embedded.len(),
                    queried = vector.len(),
                    "skipping embedding with mismatched dimension"
                );
                continue;
            }
            let distance = cosine_distance(vector, &embedded);
            hit.score = (1.0 - distance).clamp(0.0, 1.0);
            scored.push((distance, hit));
        }

        scored.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.segment_id.cmp(&b.1.segment_id))
        });

        Ok(scored
            .into_iter()
            .map(|(_, hit)| hit)
            .skip(offset)
            .take(limit)
            .collect())
    }

    /// Unbounded count of the segments the search primitives would match.
    /// `query` counts keyword matches, `vector` counts segments carrying an
    /// embedding of the query's dimension, both count the union.
    pub(crate) fn count_matches_sync(
        &self,
        query: Option<&str>,
        vector: Option<&[f32]>,
        bucket: Option<&str>,
        speaker: Option<&str>,
    ) -> Result<usize, PipelineError> {
        if vector.is_some_and(|v| v.is_empty()) {
            return Err(PipelineError::InvalidInput(
                "semantic count requires a query vector".into(),
            ));
        }
        let tokens = query.map(tokenize).unwrap_or_default();
        let has_keyword = !tokens.is_empty();
        let has_vector = vector.is_some();
        if !has_keyword && !has_vector {
            // A query was given but held no tokens: nothing can match.
            if query.is_some() {
                return Ok(0);
            }
            return Err(PipelineError::InvalidInput(
                "count requires a keyword query or a vector".into(),
            ));
        }

        let mut sql = String::from(
            "SELECT COUNT(*)
             FROM transcript_segments s
             JOIN media_assets a ON a.asset_id = s.asset_id",
        );
        let mut params: Vec<Value> = Vec::new();

        if let Some(vector) = vector {
            // LEFT JOIN when keyword matches count too, so keyword-only
            // hits without an embedding are not dropped from the union.
            let join = if has_keyword { "LEFT JOIN" } else { "JOIN" };
            sql.push_str(&format!(
                " {join} transcript_embeddings e
                   ON e.asset_id = s.asset_id
                  AND e.version_id = s.version_id
                  AND e.segment_id = s.segment_id
                  AND e.visibility = ?
                  AND e.dimension = ?"
            ));
            params.push(Value::from(PublishState::Active.as_str().to_string()));
            params.push(Value::from(vector.len() as i64));
        }

        sql.push_str(
            " WHERE s.visibility = ?
               AND a.tombstone = 0
               AND a.current_version_id = s.version_id",
        );
        params.push(Value::from(PublishState::Active.as_str().to_string()));

        if let Some(bucket) = bucket {
            sql.push_str(" AND a.bucket = ?");
            params.push(Value::from(bucket.to_string()));
        }
        if let Some(speaker) = speaker {
            sql.push_str(" AND s.speaker = ?");
            params.push(Value::from(speaker.to_string()));
        }

        if has_keyword {
            sql.push_str(" AND ((");
            for (i, token) in tokens.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" OR ");
                }
                sql.push_str("LOWER(s.text) LIKE ?");
                params.push(Value::from(format!("%{token}%")));
            }
            sql.push(')');
            if has_vector {
                sql.push_str(" OR e.segment_id IS NOT NULL");
            }
            sql.push(')');
        }

        let conn = self.connect()?;
        let count: i64 = conn.query_row(&sql, params_from_iter(params), |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_score_is_density_not_binary() {
        let tokens = tokenize("hello");
        let short = keyword_score("hello", &tokens);
        let long = keyword_score("hello and a great many other words besides", &tokens);
        assert!(short > long);
        assert!(short <= 1.0 && long > 0.0);
    }

    #[test]
    fn keyword_score_counts_occurrences() {
        let tokens = tokenize("ab");
        let once = keyword_score("ab cd ef gh", &tokens);
        let twice = keyword_score("ab cd ab ef", &tokens);
        assert!(twice > once);
    }

    #[test]
    fn keyword_score_empty_text() {
        assert_eq!(keyword_score("", &tokenize("x")), 0.0);
    }

    #[test]
    fn cosine_distance_basics() {
        let a = [1.0, 0.0];
        let b = [1.0, 0.0];
        let c = [0.0, 1.0];
        let d = [-1.0, 0.0];
        assert!(cosine_distance(&a, &b).abs() < 1e-6);
        assert!((cosine_distance(&a, &c) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&a, &d) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_is_distant() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }
}
