//! Deterministic failure classification.
//!
//! Errors arriving from engines and adapters carry either a structured
//! code or only a message; both map onto [`ErrorKind`] through the tables
//! here. The triage mapping turns a terminal kind into the operator-facing
//! state and recommended action.

use crate::error::{ErrorKind, PipelineError};
use crate::models::TriageState;

/// Classify a pipeline error for retry/quarantine routing.
pub fn classify(error: &PipelineError) -> ErrorKind {
    error.kind()
}

/// Classify an external failure by code, falling back to a substring match
/// on the message. Unknown failures classify as transient network so the
/// retry budget, not a guess, decides their fate.
pub fn classify_external(code: Option<&str>, message: &str) -> ErrorKind {
    if let Some(kind) = code.and_then(ErrorKind::from_str) {
        return kind;
    }
    let lower = message.to_lowercase();

    const MEDIA_FORMAT: &[&str] = &[
        "codec",
        "corrupt",
        "unsupported format",
        "unsupported media",
        "invalid media",
        "cannot decode",
        "decode error",
        "malformed",
    ];
    const ENGINE_CONFIG: &[&str] = &[
        "model not found",
        "no such model",
        "invalid parameter",
        "invalid argument",
        "unknown engine",
        "not installed",
    ];
    const PERMANENT: &[&str] = &[
        "permission denied",
        "access denied",
        "forbidden",
        "unauthorized",
        "quota exceeded",
        "payment required",
    ];
    const TRANSIENT_RESOURCE: &[&str] = &[
        "busy",
        "overloaded",
        "out of memory",
        "gpu",
        "resource exhausted",
        "too many requests in flight",
    ];
    const TRANSIENT_NETWORK: &[&str] = &[
        "timeout",
        "timed out",
        "connection reset",
        "connection refused",
        "rate limit",
        "unavailable",
        "temporarily",
        "broken pipe",
        "network",
    ];

    let matches_any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if matches_any(MEDIA_FORMAT) {
        ErrorKind::MediaFormat
    } else if matches_any(ENGINE_CONFIG) {
        ErrorKind::EngineConfig
    } else if matches_any(PERMANENT) {
        ErrorKind::PermanentDownstream
    } else if matches_any(TRANSIENT_RESOURCE) {
        ErrorKind::TransientResource
    } else if matches_any(TRANSIENT_NETWORK) {
        ErrorKind::TransientNetwork
    } else {
        ErrorKind::TransientNetwork
    }
}

/// Triage classification for an asset headed to quarantine.
///
/// `retries_exhausted` distinguishes a retryable kind that ran out of
/// attempts from a terminal kind seen on the first failure.
pub fn triage_for(kind: ErrorKind, retries_exhausted: bool) -> (TriageState, &'static str) {
    match kind {
        ErrorKind::MediaFormat => (
            TriageState::NeedsMediaFix,
            "Re-encode with supported codec or repair corruption",
        ),
        ErrorKind::EngineConfig => (
            TriageState::NeedsEngineTuning,
            "Review engine configuration or choose alternative engine",
        ),
        ErrorKind::PermanentDownstream => {
            (TriageState::Quarantined, "Manual investigation required")
        }
        _ if retries_exhausted => (
            TriageState::Quarantined,
            "Manual investigation — retries exhausted",
        ),
        _ => (TriageState::Quarantined, "Manual investigation required"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_wins_over_message() {
        assert_eq!(
            classify_external(Some("MEDIA_FORMAT"), "connection reset"),
            ErrorKind::MediaFormat
        );
    }

    #[test]
    fn message_table() {
        assert_eq!(
            classify_external(None, "ffmpeg: unknown codec in stream 0"),
            ErrorKind::MediaFormat
        );
        assert_eq!(
            classify_external(None, "model not found: large-v9"),
            ErrorKind::EngineConfig
        );
        assert_eq!(
            classify_external(None, "403 Forbidden"),
            ErrorKind::PermanentDownstream
        );
        assert_eq!(
            classify_external(None, "engine busy, try later"),
            ErrorKind::TransientResource
        );
        assert_eq!(
            classify_external(None, "read timed out"),
            ErrorKind::TransientNetwork
        );
    }

    #[test]
    fn unknown_defaults_to_transient() {
        assert_eq!(
            classify_external(None, "something inexplicable"),
            ErrorKind::TransientNetwork
        );
    }

    #[test]
    fn triage_mapping_by_error_kind() {
        assert_eq!(
            triage_for(ErrorKind::MediaFormat, false),
            (
                TriageState::NeedsMediaFix,
                "Re-encode with supported codec or repair corruption"
            )
        );
        assert_eq!(
            triage_for(ErrorKind::EngineConfig, false),
            (
                TriageState::NeedsEngineTuning,
                "Review engine configuration or choose alternative engine"
            )
        );
        assert_eq!(
            triage_for(ErrorKind::PermanentDownstream, false),
            (TriageState::Quarantined, "Manual investigation required")
        );
        assert_eq!(
            triage_for(ErrorKind::TransientNetwork, true),
            (
                TriageState::Quarantined,
                "Manual investigation — retries exhausted"
            )
        );
    }
}
