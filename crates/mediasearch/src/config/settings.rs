//! Application settings.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::{DEFAULT_DATABASE_FILENAME, DEFAULT_EMBEDDING_DIMENSION};

/// Infrastructure backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// SQLite, filesystem object store, in-process queue.
    Local,
    /// Production adapters (S3-like store, broker queue, vector database).
    /// Recognized but not wired in this build; selecting it is a
    /// configuration error naming the missing adapters.
    Production,
}

impl Backend {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "local" => Some(Self::Local),
            "production" => Some(Self::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },
    #[error("unknown backend `{0}` (expected `local` or `production`)")]
    UnknownBackend(String),
    #[error("hybrid weights must be non-negative and sum to a positive value")]
    InvalidHybridWeights,
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Application settings.
///
/// Defaults suit local development; every field has an environment
/// override (see [`Settings::from_env`]).
#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: Backend,
    /// Base data directory (database + local object store buckets).
    pub data_dir: PathBuf,
    pub database_filename: String,
    /// Embedding vector dimension D.
    pub embedding_dimension: usize,
    /// Whether segment embeddings and semantic search are enabled.
    pub semantic_search_enabled: bool,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// Concurrent jobs the orchestrator worker pool runs.
    pub job_concurrency: usize,
    /// Wall-clock budget per job.
    pub job_timeout: Duration,
    pub hybrid_keyword_weight: f32,
    pub hybrid_semantic_weight: f32,
    /// ARCHIVED versions older than this are eligible for purge.
    pub retention_days: u32,
    /// Selected ASR engine name.
    pub asr_engine: String,
    /// Media longer than this uses fixed-window chunking.
    pub compute_threshold_seconds: u32,
    /// Max texts per embed-batch call.
    pub embed_batch_size: usize,
    /// Remote embedding endpoint; None selects the local hash embedder.
    pub embedder_url: Option<String>,
    /// Object-store poll interval for the local subscription loop.
    pub poll_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mediasearch");

        Self {
            backend: Backend::Local,
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            semantic_search_enabled: true,
            max_attempts: 5,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(300),
            job_concurrency: 4,
            job_timeout: Duration::from_secs(600),
            hybrid_keyword_weight: 0.5,
            hybrid_semantic_weight: 0.5,
            retention_days: 30,
            asr_engine: "whisper".to_string(),
            compute_threshold_seconds: 600,
            embed_batch_size: 32,
            embedder_url: None,
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl Settings {
    /// Settings rooted at a specific data directory (tests, one-shot tools).
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Build settings from the environment on top of defaults.
    pub fn from_env() -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        if let Ok(v) = std::env::var("MEDIASEARCH_BACKEND") {
            settings.backend = Backend::from_str(&v).ok_or(SettingsError::UnknownBackend(v))?;
        }
        if let Ok(v) = std::env::var("MEDIASEARCH_DATA_DIR") {
            settings.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MEDIASEARCH_EMBEDDING_DIM") {
            settings.embedding_dimension = parse_env("MEDIASEARCH_EMBEDDING_DIM", &v)?;
        }
        if let Ok(v) = std::env::var("MEDIASEARCH_SEMANTIC_SEARCH") {
            settings.semantic_search_enabled = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = std::env::var("MEDIASEARCH_MAX_ATTEMPTS") {
            settings.max_attempts = parse_env("MEDIASEARCH_MAX_ATTEMPTS", &v)?;
        }
        if let Ok(v) = std::env::var("MEDIASEARCH_RETRY_BASE_MS") {
            settings.retry_base_delay =
                Duration::from_millis(parse_env("MEDIASEARCH_RETRY_BASE_MS", &v)?);
        }
        if let Ok(v) = std::env::var("MEDIASEARCH_RETRY_MAX_DELAY_MS") {
            settings.retry_max_delay =
                Duration::from_millis(parse_env("MEDIASEARCH_RETRY_MAX_DELAY_MS", &v)?);
        }
        if let Ok(v) = std::env::var("MEDIASEARCH_JOB_CONCURRENCY") {
            settings.job_concurrency = parse_env("MEDIASEARCH_JOB_CONCURRENCY", &v)?;
        }
        if let Ok(v) = std::env::var("MEDIASEARCH_JOB_TIMEOUT_SECS") {
            settings.job_timeout =
                Duration::from_secs(parse_env("MEDIASEARCH_JOB_TIMEOUT_SECS", &v)?);
        }
        if let Ok(v) = std::env::var("MEDIASEARCH_HYBRID_KEYWORD_WEIGHT") {
            settings.hybrid_keyword_weight = parse_env("MEDIASEARCH_HYBRID_KEYWORD_WEIGHT", &v)?;
        }
        if let Ok(v) = std::env::var("MEDIASEARCH_HYBRID_SEMANTIC_WEIGHT") {
            settings.hybrid_semantic_weight = parse_env("MEDIASEARCH_HYBRID_SEMANTIC_WEIGHT", &v)?;
        }
        if let Ok(v) = std::env::var("MEDIASEARCH_RETENTION_DAYS") {
            settings.retention_days = parse_env("MEDIASEARCH_RETENTION_DAYS", &v)?;
        }
        if let Ok(v) = std::env::var("MEDIASEARCH_ASR_ENGINE") {
            settings.asr_engine = v;
        }
        if let Ok(v) = std::env::var("MEDIASEARCH_COMPUTE_THRESHOLD_SECS") {
            settings.compute_threshold_seconds =
                parse_env("MEDIASEARCH_COMPUTE_THRESHOLD_SECS", &v)?;
        }
        if let Ok(v) = std::env::var("MEDIASEARCH_EMBED_BATCH_SIZE") {
            settings.embed_batch_size = parse_env("MEDIASEARCH_EMBED_BATCH_SIZE", &v)?;
        }
        if let Ok(v) = std::env::var("MEDIASEARCH_EMBEDDER_URL") {
            settings.embedder_url = Some(v);
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.hybrid_keyword_weight < 0.0
            || self.hybrid_semantic_weight < 0.0
            || self.hybrid_keyword_weight + self.hybrid_semantic_weight <= 0.0
        {
            return Err(SettingsError::InvalidHybridWeights);
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Root directory for local object-store buckets.
    pub fn buckets_dir(&self) -> PathBuf {
        self.data_dir.join("buckets")
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> Result<(), SettingsError> {
        for dir in [&self.data_dir, &self.buckets_dir()] {
            fs::create_dir_all(dir).map_err(|e| SettingsError::CreateDir {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, SettingsError> {
    value.parse().map_err(|_| SettingsError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.backend, Backend::Local);
        assert_eq!(s.embedding_dimension, 384);
        assert_eq!(s.max_attempts, 5);
        assert_eq!(s.retry_base_delay, Duration::from_secs(1));
        assert_eq!(s.retry_max_delay, Duration::from_secs(300));
        assert_eq!(s.job_concurrency, 4);
        assert_eq!(s.job_timeout, Duration::from_secs(600));
    }

    #[test]
    fn backend_parse() {
        assert_eq!(Backend::from_str("LOCAL"), Some(Backend::Local));
        assert_eq!(Backend::from_str("production"), Some(Backend::Production));
        assert_eq!(Backend::from_str("vast"), None);
    }

    #[test]
    fn invalid_weights_rejected() {
        let mut s = Settings::default();
        s.hybrid_keyword_weight = 0.0;
        s.hybrid_semantic_weight = 0.0;
        assert!(matches!(
            s.validate(),
            Err(SettingsError::InvalidHybridWeights)
        ));
    }
}
