//! Transcript chunking.
//!
//! The raw ASR result is re-chunked before indexing. Sentence chunking is
//! the default; fixed-window chunking is the fallback for long media where
//! per-sentence re-splitting is not worth the compute. Selection lives in
//! [`choose_strategy`]; both algorithms are pure and deterministic.

use crate::models::{ChunkingStrategy, EnginePolicy};
use crate::ports::{AsrResult, AsrSegment};

/// Default fixed-window width.
pub const DEFAULT_WINDOW_MS: i64 = 5000;

/// A chunk produced by segmentation, before ids are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDraft {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    pub speaker: Option<String>,
    pub confidence: f32,
}

/// Select the chunking strategy for a transcription result.
///
/// A forced strategy in the policy always wins. Otherwise media strictly
/// longer than the compute threshold falls back to fixed-window; duration
/// exactly at the threshold still uses sentence chunking.
pub fn choose_strategy(duration_ms: i64, policy: &EnginePolicy) -> ChunkingStrategy {
    if let Some(forced) = policy.force_chunking_strategy {
        return forced;
    }
    let threshold_ms = i64::from(policy.compute_threshold_seconds) * 1000;
    if duration_ms > threshold_ms {
        ChunkingStrategy::FixedWindow
    } else {
        ChunkingStrategy::Sentence
    }
}

/// Chunk an ASR result with the given strategy.
pub fn segment_transcript(
    asr: &AsrResult,
    strategy: ChunkingStrategy,
    window_ms: i64,
) -> Vec<SegmentDraft> {
    match strategy {
        ChunkingStrategy::Sentence => sentence_chunks(&asr.segments),
        ChunkingStrategy::FixedWindow => fixed_window_chunks(&asr.segments, window_ms),
    }
}

/// Re-split each ASR window by sentence terminators, distributing the
/// window's duration proportionally to sentence text length. Speaker and
/// confidence carry through from the spanning window.
fn sentence_chunks(segments: &[AsrSegment]) -> Vec<SegmentDraft> {
    let mut out = Vec::new();
    for seg in segments {
        let sentences = split_sentences(&seg.text);
        if sentences.is_empty() {
            continue;
        }
        let duration = (seg.end_ms - seg.start_ms).max(0);
        let total_len: usize = sentences.iter().map(|s| s.chars().count()).sum();
        let mut cursor = seg.start_ms;
        let count = sentences.len();
        for (i, sentence) in sentences.into_iter().enumerate() {
            let end = if i + 1 == count {
                seg.end_ms
            } else if total_len == 0 {
                cursor
            } else {
                let share = duration * sentence.chars().count() as i64 / total_len as i64;
                cursor + share
            };
            out.push(SegmentDraft {
                start_ms: cursor,
                end_ms: end,
                text: sentence,
                speaker: seg.speaker.clone(),
                confidence: seg.confidence,
            });
            cursor = end;
        }
    }
    out
}

/// Group ASR windows into fixed slots of `window_ms`, keyed by start time.
/// Each slot concatenates its texts, takes the majority speaker, and
/// averages confidence.
fn fixed_window_chunks(segments: &[AsrSegment], window_ms: i64) -> Vec<SegmentDraft> {
    debug_assert!(window_ms > 0);
    let mut slots: Vec<(i64, Vec<&AsrSegment>)> = Vec::new();
    for seg in segments {
        let slot = seg.start_ms / window_ms;
        match slots.iter_mut().find(|(s, _)| *s == slot) {
            Some((_, members)) => members.push(seg),
            None => slots.push((slot, vec![seg])),
        }
    }
    slots.sort_by_key(|(slot, _)| *slot);

    slots
        .into_iter()
        .map(|(_, members)| {
            let start_ms = members.iter().map(|s| s.start_ms).min().unwrap_or(0);
            let end_ms = members.iter().map(|s| s.end_ms).max().unwrap_or(start_ms);
            let text = members
                .iter()
                .map(|s| s.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            let confidence =
                members.iter().map(|s| s.confidence).sum::<f32>() / members.len() as f32;
            SegmentDraft {
                start_ms,
                end_ms,
                text,
                speaker: majority_speaker(&members),
                confidence,
            }
        })
        .filter(|draft| !draft.text.is_empty())
        .collect()
}

/// Most frequent speaker label among the contributing windows; ties go to
/// the earliest contributor. None when no window carries a label.
fn majority_speaker(members: &[&AsrSegment]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for seg in members {
        if let Some(speaker) = seg.speaker.as_deref() {
            match counts.iter_mut().find(|(s, _)| *s == speaker) {
                Some((_, n)) => *n += 1,
                None => counts.push((speaker, 1)),
            }
        }
    }
    counts
        .into_iter()
        .max_by_key(|(_, n)| *n)
        .map(|(s, _)| s.to_string())
}

/// Split on `.`, `!`, `?`, keeping the terminator with its sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asr_segment(start: i64, end: i64, text: &str, speaker: Option<&str>, conf: f32) -> AsrSegment {
        AsrSegment {
            start_ms: start,
            end_ms: end,
            text: text.to_string(),
            speaker: speaker.map(String::from),
            confidence: conf,
        }
    }

    fn policy(threshold_secs: u32) -> EnginePolicy {
        EnginePolicy::new("whisper", threshold_secs)
    }

    #[test]
    fn strategy_at_threshold_is_sentence() {
        let p = policy(600);
        assert_eq!(choose_strategy(600_000, &p), ChunkingStrategy::Sentence);
        assert_eq!(choose_strategy(600_001, &p), ChunkingStrategy::FixedWindow);
    }

    #[test]
    fn forced_strategy_overrides_selection() {
        let mut p = policy(600);
        p.force_chunking_strategy = Some(ChunkingStrategy::FixedWindow);
        assert_eq!(choose_strategy(1000, &p), ChunkingStrategy::FixedWindow);
    }

    #[test]
    fn sentence_split_keeps_terminators() {
        assert_eq!(
            split_sentences("Hello world. How are you? Fine!"),
            vec!["Hello world.", "How are you?", "Fine!"]
        );
        assert_eq!(split_sentences("no terminator"), vec!["no terminator"]);
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn sentence_durations_are_proportional_and_exhaustive() {
        let asr = AsrResult {
            segments: vec![asr_segment(0, 1000, "One two. Four!", Some("spk_0"), 0.9)],
            duration_ms: 1000,
            engine: "test".into(),
        };
        let drafts = segment_transcript(&asr, ChunkingStrategy::Sentence, DEFAULT_WINDOW_MS);
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].start_ms, 0);
        // "One two." is 8 of 13 chars: 1000 * 8 / 13 = 615.
        assert_eq!(drafts[0].end_ms, 615);
        assert_eq!(drafts[1].start_ms, 615);
        // Last sentence always closes at the window end.
        assert_eq!(drafts[1].end_ms, 1000);
        assert_eq!(drafts[0].speaker.as_deref(), Some("spk_0"));
        assert_eq!(drafts[1].confidence, 0.9);
    }

    #[test]
    fn fixed_window_groups_by_slot() {
        let asr = AsrResult {
            segments: vec![
                asr_segment(0, 2000, "first", Some("a"), 0.8),
                asr_segment(2500, 4500, "second", Some("b"), 0.6),
                asr_segment(6000, 7000, "third", Some("b"), 1.0),
            ],
            duration_ms: 7000,
            engine: "test".into(),
        };
        let drafts = segment_transcript(&asr, ChunkingStrategy::FixedWindow, 5000);
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].text, "first second");
        assert_eq!(drafts[0].start_ms, 0);
        assert_eq!(drafts[0].end_ms, 4500);
        // Majority among {a, b} ties; earliest contributor wins.
        assert_eq!(drafts[0].speaker.as_deref(), Some("a"));
        assert!((drafts[0].confidence - 0.7).abs() < 1e-6);
        assert_eq!(drafts[1].text, "third");
        assert_eq!(drafts[1].speaker.as_deref(), Some("b"));
    }

    #[test]
    fn fixed_window_majority_speaker() {
        let asr = AsrResult {
            segments: vec![
                asr_segment(0, 1000, "a", Some("x"), 0.5),
                asr_segment(1000, 2000, "b", Some("y"), 0.5),
                asr_segment(2000, 3000, "c", Some("y"), 0.5),
            ],
            duration_ms: 3000,
            engine: "test".into(),
        };
        let drafts = segment_transcript(&asr, ChunkingStrategy::FixedWindow, 5000);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].speaker.as_deref(), Some("y"));
    }

    #[test]
    fn empty_asr_yields_no_chunks() {
        let asr = AsrResult {
            segments: vec![],
            duration_ms: 0,
            engine: "test".into(),
        };
        assert!(segment_transcript(&asr, ChunkingStrategy::Sentence, 5000).is_empty());
        assert!(segment_transcript(&asr, ChunkingStrategy::FixedWindow, 5000).is_empty());
    }
}
