//! Filesystem-backed object store.
//!
//! A bucket is a directory under the store root; the object key is the
//! file's relative path. Etags are content hashes, so overwrites with new
//! bytes produce new etags the same way S3 does. Notifications come from
//! a polling scan with a process-local seen-set; consumers must tolerate
//! replays after restart.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::ports::{ObjectEvent, ObjectEventKind, ObjectMeta, ObjectStore};

/// Events buffered per subscription before the poller blocks.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    poll_interval: Duration,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            root: root.into(),
            poll_interval,
        }
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, PipelineError> {
        if key.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(PipelineError::InvalidInput(format!(
                "invalid object key `{key}`"
            )));
        }
        Ok(self.bucket_dir(bucket).join(key))
    }

    fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PipelineError> {
        let path = self.object_path(bucket, key)?;
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::NotFound(format!("{bucket}/{key}"))
            } else {
                PipelineError::ObjectFetch {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }
}

/// Content etag: first half of the SHA-256 hex digest.
fn compute_etag(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..16])
}

fn sniff_content_type(bytes: &[u8], key: &str) -> Option<String> {
    if let Some(kind) = infer::get(bytes) {
        return Some(kind.mime_type().to_string());
    }
    // Raw PCM and some broadcast containers have no magic bytes.
    match key.rsplit('.').next().map(|e| e.to_lowercase()).as_deref() {
        Some("wav") => Some("audio/wav".to_string()),
        Some("mp3") => Some("audio/mpeg".to_string()),
        Some("aac") => Some("audio/aac".to_string()),
        Some("flac") => Some("audio/flac".to_string()),
        Some("mp4") => Some("video/mp4".to_string()),
        Some("mov") => Some("video/quicktime".to_string()),
        Some("mxf") => Some("application/mxf".to_string()),
        _ => None,
    }
}

fn meta_for(path: &Path, bytes: &[u8], key: &str) -> Result<ObjectMeta, PipelineError> {
    let fs_meta = fs::metadata(path)?;
    let mtime: DateTime<Utc> = fs_meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    Ok(ObjectMeta {
        etag: compute_etag(bytes),
        size: bytes.len() as u64,
        content_type: sniff_content_type(bytes, key),
        mtime,
    })
}

/// Recursively collect object keys (relative, '/'-separated) under `dir`.
fn collect_keys(dir: &Path, base: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_keys(&path, base, out)?;
        } else if let Ok(rel) = path.strip_prefix(base) {
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push(key);
        }
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PipelineError> {
        self.read_object(bucket, key)
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, PipelineError> {
        let path = self.object_path(bucket, key)?;
        let bytes = self.read_object(bucket, key)?;
        meta_for(&path, &bytes, key)
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, PipelineError> {
        Ok(self.object_path(bucket, key)?.exists())
    }

    async fn list(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<String>, PipelineError> {
        let dir = self.bucket_dir(bucket);
        let mut keys = Vec::new();
        collect_keys(&dir, &dir, &mut keys)?;
        if let Some(prefix) = prefix {
            keys.retain(|k| k.starts_with(prefix));
        }
        keys.sort();
        Ok(keys)
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        _content_type: Option<&str>,
    ) -> Result<ObjectMeta, PipelineError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        meta_for(&path, bytes, key)
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), PipelineError> {
        let path = self.object_path(bucket, key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, PipelineError> {
        let path = self.object_path(bucket, key)?;
        let expires =
            Utc::now() + chrono::Duration::from_std(expires_in).unwrap_or_else(|_| chrono::Duration::zero());
        Ok(format!(
            "file://{}?expires={}",
            path.display(),
            expires.timestamp()
        ))
    }

    async fn subscribe(
        &self,
        bucket: &str,
    ) -> Result<mpsc::Receiver<ObjectEvent>, PipelineError> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let dir = self.bucket_dir(bucket);
        fs::create_dir_all(&dir)?;
        let bucket = bucket.to_string();
        let interval = self.poll_interval;

        tokio::spawn(async move {
            // key -> etag of last observed content.
            let mut seen: HashMap<String, String> = HashMap::new();
            loop {
                let mut keys = Vec::new();
                if let Err(e) = collect_keys(&dir, &dir, &mut keys) {
                    warn!(%bucket, error = %e, "bucket scan failed");
                    tokio::time::sleep(interval).await;
                    continue;
                }

                let mut current: HashMap<String, String> = HashMap::new();
                for key in keys {
                    let path = dir.join(&key);
                    let Ok(bytes) = fs::read(&path) else { continue };
                    let etag = compute_etag(&bytes);
                    let changed = seen.get(&key) != Some(&etag);
                    current.insert(key.clone(), etag.clone());
                    if changed {
                        debug!(%bucket, %key, "object created/changed");
                        let event = ObjectEvent {
                            kind: ObjectEventKind::Created,
                            bucket: bucket.clone(),
                            object_key: key,
                            etag: Some(etag),
                            size: Some(bytes.len() as u64),
                            timestamp: Utc::now(),
                        };
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }

                for key in seen.keys() {
                    if !current.contains_key(key) {
                        debug!(%bucket, %key, "object removed");
                        let event = ObjectEvent {
                            kind: ObjectEventKind::Removed,
                            bucket: bucket.clone(),
                            object_key: key.clone(),
                            etag: None,
                            size: None,
                            timestamp: Utc::now(),
                        };
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }

                seen = current;
                tokio::time::sleep(interval).await;
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> LocalObjectStore {
        LocalObjectStore::new(temp.path(), Duration::from_millis(20))
    }

    #[tokio::test]
    async fn put_head_get_roundtrip() {
        let temp = TempDir::new().unwrap();
        let s = store(&temp);
        let meta = s.put("media", "clips/hello.wav", b"RIFFdata", None).await.unwrap();
        assert_eq!(meta.size, 8);
        assert!(!meta.etag.is_empty());

        let head = s.head("media", "clips/hello.wav").await.unwrap();
        assert_eq!(head.etag, meta.etag);

        let bytes = s.get("media", "clips/hello.wav").await.unwrap();
        assert_eq!(bytes, b"RIFFdata");
    }

    #[tokio::test]
    async fn etag_tracks_content() {
        let temp = TempDir::new().unwrap();
        let s = store(&temp);
        let m1 = s.put("media", "a.wav", b"one", None).await.unwrap();
        let m2 = s.put("media", "a.wav", b"two", None).await.unwrap();
        assert_ne!(m1.etag, m2.etag);
        let m3 = s.put("media", "a.wav", b"one", None).await.unwrap();
        assert_eq!(m1.etag, m3.etag);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let s = store(&temp);
        let err = s.get("media", "nope.wav").await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_with_prefix() {
        let temp = TempDir::new().unwrap();
        let s = store(&temp);
        s.put("media", "a/x.wav", b"1", None).await.unwrap();
        s.put("media", "a/y.wav", b"2", None).await.unwrap();
        s.put("media", "b/z.wav", b"3", None).await.unwrap();
        let all = s.list("media", None).await.unwrap();
        assert_eq!(all.len(), 3);
        let filtered = s.list("media", Some("a/")).await.unwrap();
        assert_eq!(filtered, vec!["a/x.wav", "a/y.wav"]);
    }

    #[tokio::test]
    async fn traversal_keys_rejected() {
        let temp = TempDir::new().unwrap();
        let s = store(&temp);
        let err = s.get("media", "../escape").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn subscribe_reports_create_and_remove() {
        let temp = TempDir::new().unwrap();
        let s = store(&temp);
        let mut rx = s.subscribe("media").await.unwrap();

        s.put("media", "clip.wav", b"audio", None).await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event within deadline")
            .expect("channel open");
        assert_eq!(event.kind, ObjectEventKind::Created);
        assert_eq!(event.object_key, "clip.wav");
        assert!(event.etag.is_some());

        s.delete("media", "clip.wav").await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event within deadline")
            .expect("channel open");
        assert_eq!(event.kind, ObjectEventKind::Removed);
        assert_eq!(event.object_key, "clip.wav");
    }
}
