//! Asset and asset-version models.
//!
//! An asset is the stable identity for a `(bucket, object_key)` pair; a
//! version is one content state of that asset, keyed by a deterministic
//! hash so re-ingesting identical bytes converges on the same row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Processing status of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetStatus {
    Ingested,
    Transcribing,
    Transcribed,
    Indexed,
    PendingRetry,
    Quarantined,
    /// Operator skipped the asset. Terminal.
    Failed,
    /// Underlying object was removed. Terminal.
    Deleted,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingested => "INGESTED",
            Self::Transcribing => "TRANSCRIBING",
            Self::Transcribed => "TRANSCRIBED",
            Self::Indexed => "INDEXED",
            Self::PendingRetry => "PENDING_RETRY",
            Self::Quarantined => "QUARANTINED",
            Self::Failed => "FAILED",
            Self::Deleted => "DELETED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "INGESTED" => Some(Self::Ingested),
            "TRANSCRIBING" => Some(Self::Transcribing),
            "TRANSCRIBED" => Some(Self::Transcribed),
            "INDEXED" => Some(Self::Indexed),
            "PENDING_RETRY" => Some(Self::PendingRetry),
            "QUARANTINED" => Some(Self::Quarantined),
            "FAILED" => Some(Self::Failed),
            "DELETED" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Operator-facing classification of why an asset was quarantined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriageState {
    NeedsMediaFix,
    NeedsEngineTuning,
    Quarantined,
}

impl TriageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeedsMediaFix => "NEEDS_MEDIA_FIX",
            Self::NeedsEngineTuning => "NEEDS_ENGINE_TUNING",
            Self::Quarantined => "QUARANTINED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "NEEDS_MEDIA_FIX" => Some(Self::NeedsMediaFix),
            "NEEDS_ENGINE_TUNING" => Some(Self::NeedsEngineTuning),
            "QUARANTINED" => Some(Self::Quarantined),
            _ => None,
        }
    }
}

/// The canonical record per `(bucket, object_key)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub asset_id: String,
    /// Survives delete/reupload of the same key.
    pub lineage_id: String,
    pub bucket: String,
    pub object_key: String,
    /// References an ACTIVE version when set.
    pub current_version_id: Option<String>,
    pub status: AssetStatus,
    pub triage_state: Option<TriageState>,
    pub recommended_action: Option<String>,
    /// Selected ASR engine name (e.g. "whisper").
    pub engine: String,
    pub last_error: Option<String>,
    pub attempt: u32,
    pub file_size: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub duration_ms: Option<i64>,
    pub codec_info: Option<String>,
    pub tombstone: bool,
    pub ingest_time: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    pub fn new(bucket: impl Into<String>, object_key: impl Into<String>, engine: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            asset_id: uuid::Uuid::new_v4().to_string(),
            lineage_id: uuid::Uuid::new_v4().to_string(),
            bucket: bucket.into(),
            object_key: object_key.into(),
            current_version_id: None,
            status: AssetStatus::Ingested,
            triage_state: None,
            recommended_action: None,
            engine: engine.into(),
            last_error: None,
            attempt: 0,
            file_size: 0,
            content_type: None,
            etag: None,
            duration_ms: None,
            codec_info: None,
            tombstone: false,
            ingest_time: now,
            updated_at: now,
        }
    }
}

/// Transcription progress of a single version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionStatus {
    Ingested,
    Transcribed,
    Published,
    Failed,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingested => "INGESTED",
            Self::Transcribed => "TRANSCRIBED",
            Self::Published => "PUBLISHED",
            Self::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "INGESTED" => Some(Self::Ingested),
            "TRANSCRIBED" => Some(Self::Transcribed),
            "PUBLISHED" => Some(Self::Published),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Visibility lifecycle of a version's rows. At most one version per asset
/// is ACTIVE at any moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishState {
    Staging,
    Active,
    Archived,
    SoftDeleted,
}

impl PublishState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staging => "STAGING",
            Self::Active => "ACTIVE",
            Self::Archived => "ARCHIVED",
            Self::SoftDeleted => "SOFT_DELETED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "STAGING" => Some(Self::Staging),
            "ACTIVE" => Some(Self::Active),
            "ARCHIVED" => Some(Self::Archived),
            "SOFT_DELETED" => Some(Self::SoftDeleted),
            _ => None,
        }
    }
}

/// One distinct content state of an asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetVersion {
    pub version_id: String,
    pub asset_id: String,
    pub status: VersionStatus,
    pub publish_state: PublishState,
    pub etag: String,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

impl AssetVersion {
    pub fn new(asset_id: impl Into<String>, etag: impl Into<String>, file_size: u64, mtime_ms: i64) -> Self {
        let etag = etag.into();
        Self {
            version_id: derive_version_id(&etag, file_size, mtime_ms),
            asset_id: asset_id.into(),
            status: VersionStatus::Ingested,
            publish_state: PublishState::Staging,
            etag,
            file_size,
            created_at: Utc::now(),
        }
    }

    /// Whether a job for this version has nothing left to do.
    pub fn is_processed(&self) -> bool {
        matches!(self.status, VersionStatus::Transcribed | VersionStatus::Published)
            || matches!(self.publish_state, PublishState::Active | PublishState::Archived)
    }
}

/// Deterministic version id from object identity fields.
///
/// Re-ingesting the same `(etag, size, mtime)` must yield the same id; this
/// is the idempotency anchor for the whole pipeline.
pub fn derive_version_id(etag: &str, file_size: u64, mtime_ms: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(etag.as_bytes());
    hasher.update(b":");
    hasher.update(file_size.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(mtime_ms.to_string().as_bytes());
    let digest = hasher.finalize();
    format!("v_{}", hex::encode(&digest[..16]))
}
