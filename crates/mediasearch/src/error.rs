//! Pipeline error taxonomy.
//!
//! Every failure that crosses a component boundary is one of these variants.
//! The retry/quarantine manager keys off [`ErrorKind`] to decide between
//! delayed re-enqueue and the dead-letter queue.

use thiserror::Error;

/// Classified failure category.
///
/// Stored as the `error_code` of DLQ items and used for triage mapping,
/// so the string forms are part of the persisted surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Codec problem, corrupt bytes, or an unsupported container.
    MediaFormat,
    /// Engine setup problem: model missing, invalid parameters.
    EngineConfig,
    /// Permission denied, quota exhausted with no retry-after.
    PermanentDownstream,
    /// Timeout, connection reset, rate limit, service unavailable.
    TransientNetwork,
    /// Engine busy, temporary GPU exhaustion.
    TransientResource,
    /// Job wall-clock exceeded. Counts against the retry budget.
    Timeout,
    /// Invariant violation inside the pipeline.
    Internal,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::TransientNetwork | ErrorKind::TransientResource | ErrorKind::Timeout
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MediaFormat => "MEDIA_FORMAT",
            ErrorKind::EngineConfig => "ENGINE_CONFIG",
            ErrorKind::PermanentDownstream => "PERMANENT_DOWNSTREAM",
            ErrorKind::TransientNetwork => "TRANSIENT_NETWORK",
            ErrorKind::TransientResource => "TRANSIENT_RESOURCE",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "MEDIA_FORMAT" => Some(ErrorKind::MediaFormat),
            "ENGINE_CONFIG" => Some(ErrorKind::EngineConfig),
            "PERMANENT_DOWNSTREAM" => Some(ErrorKind::PermanentDownstream),
            "TRANSIENT_NETWORK" => Some(ErrorKind::TransientNetwork),
            "TRANSIENT_RESOURCE" => Some(ErrorKind::TransientResource),
            "TIMEOUT" => Some(ErrorKind::Timeout),
            "INTERNAL" => Some(ErrorKind::Internal),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors emitted by pipeline components and port adapters.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate version-id or idempotency key. Callers treat this as success.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("unsupported or corrupt media: {0}")]
    MediaFormat(String),

    #[error("engine configuration error: {0}")]
    EngineConfig(String),

    #[error("permanent downstream failure: {0}")]
    PermanentDownstream(String),

    #[error("transient network failure: {0}")]
    TransientNetwork(String),

    #[error("transient resource exhaustion: {0}")]
    TransientResource(String),

    #[error("job timed out after {elapsed_secs}s")]
    Timeout { elapsed_secs: u64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("object store fetch failed for {bucket}/{key}: {message}")]
    ObjectFetch {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("database error: {0}")]
    Database(String),

    /// Invariant violation. Logged loudly; aborts the current operation.
    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Failure category for retry/quarantine routing.
    ///
    /// `NotFound`, `AlreadyExists` and `InvalidInput` are caller-facing
    /// conditions, not job failures; they classify as internal so an
    /// unexpected escape into the retry path quarantines rather than loops.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::MediaFormat(_) => ErrorKind::MediaFormat,
            PipelineError::EngineConfig(_) => ErrorKind::EngineConfig,
            PipelineError::PermanentDownstream(_) => ErrorKind::PermanentDownstream,
            PipelineError::TransientNetwork(_) => ErrorKind::TransientNetwork,
            PipelineError::TransientResource(_) => ErrorKind::TransientResource,
            PipelineError::Timeout { .. } => ErrorKind::Timeout,
            PipelineError::ObjectFetch { .. } => ErrorKind::TransientNetwork,
            PipelineError::Database(_) => ErrorKind::TransientResource,
            PipelineError::NotFound(_)
            | PipelineError::AlreadyExists(_)
            | PipelineError::InvalidInput(_)
            | PipelineError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(e: rusqlite::Error) -> Self {
        PipelineError::Database(e.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::TransientResource(format!("io: {e}"))
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Internal(format!("json: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::TransientNetwork.is_retryable());
        assert!(ErrorKind::TransientResource.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::MediaFormat.is_retryable());
        assert!(!ErrorKind::EngineConfig.is_retryable());
        assert!(!ErrorKind::PermanentDownstream.is_retryable());
    }

    #[test]
    fn kind_string_roundtrip() {
        for kind in [
            ErrorKind::MediaFormat,
            ErrorKind::EngineConfig,
            ErrorKind::PermanentDownstream,
            ErrorKind::TransientNetwork,
            ErrorKind::TransientResource,
            ErrorKind::Timeout,
            ErrorKind::Internal,
        ] {
            assert_eq!(ErrorKind::from_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn object_fetch_is_retryable() {
        let err = PipelineError::ObjectFetch {
            bucket: "media".into(),
            key: "a.wav".into(),
            message: "connection refused".into(),
        };
        assert!(err.is_retryable());
    }
}
