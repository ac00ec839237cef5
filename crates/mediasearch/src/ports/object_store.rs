//! Object store contract.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::PipelineError;

/// Authoritative object metadata, as returned by `head`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMeta {
    pub etag: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub mtime: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectEventKind {
    #[serde(rename = "ObjectCreated")]
    Created,
    #[serde(rename = "ObjectRemoved")]
    Removed,
}

/// A store notification. Fields beyond the key may be absent; the ingest
/// controller backfills them via `head`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectEvent {
    #[serde(rename = "event_type")]
    pub kind: ObjectEventKind,
    pub bucket: String,
    pub object_key: String,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

/// S3-like object store.
///
/// `subscribe` delivers created/removed events at least once; consumers
/// must be idempotent (the deterministic version id is the safeguard).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PipelineError>;

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, PipelineError>;

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, PipelineError>;

    async fn list(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<String>, PipelineError>;

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> Result<ObjectMeta, PipelineError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), PipelineError>;

    async fn presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, PipelineError>;

    /// Stream of object events for a bucket.
    async fn subscribe(&self, bucket: &str) -> Result<mpsc::Receiver<ObjectEvent>, PipelineError>;
}
