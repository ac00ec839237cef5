//! Database schema.
//!
//! Applied idempotently on open. The partial unique index on
//! `media_assets` enforces one live asset per `(bucket, object_key)` while
//! letting tombstoned rows persist for lineage.

pub(crate) const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS media_assets (
    asset_id            TEXT PRIMARY KEY,
    lineage_id          TEXT NOT NULL,
    bucket              TEXT NOT NULL,
    object_key          TEXT NOT NULL,
    current_version_id  TEXT,
    status              TEXT NOT NULL,
    triage_state        TEXT,
    recommended_action  TEXT,
    engine              TEXT NOT NULL,
    last_error          TEXT,
    attempt             INTEGER NOT NULL DEFAULT 0,
    file_size           INTEGER NOT NULL DEFAULT 0,
    content_type        TEXT,
    etag                TEXT,
    duration_ms         INTEGER,
    codec_info          TEXT,
    tombstone           INTEGER NOT NULL DEFAULT 0,
    ingest_time         TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_assets_live_location
    ON media_assets (bucket, object_key) WHERE tombstone = 0;

CREATE INDEX IF NOT EXISTS idx_assets_status ON media_assets (status);

CREATE TABLE IF NOT EXISTS asset_versions (
    version_id     TEXT NOT NULL,
    asset_id       TEXT NOT NULL,
    status         TEXT NOT NULL,
    publish_state  TEXT NOT NULL,
    etag           TEXT NOT NULL,
    file_size      INTEGER NOT NULL,
    created_at     TEXT NOT NULL,
    PRIMARY KEY (asset_id, version_id)
);

CREATE INDEX IF NOT EXISTS idx_versions_publish_state
    ON asset_versions (publish_state);

CREATE TABLE IF NOT EXISTS transcript_segments (
    segment_id         TEXT NOT NULL,
    asset_id           TEXT NOT NULL,
    version_id         TEXT NOT NULL,
    start_ms           INTEGER NOT NULL,
    end_ms             INTEGER NOT NULL,
    text               TEXT NOT NULL,
    speaker            TEXT,
    confidence         REAL NOT NULL,
    visibility         TEXT NOT NULL,
    chunking_strategy  TEXT NOT NULL,
    created_at         TEXT NOT NULL,
    PRIMARY KEY (asset_id, version_id, segment_id)
);

CREATE INDEX IF NOT EXISTS idx_segments_visibility
    ON transcript_segments (visibility, asset_id);

CREATE TABLE IF NOT EXISTS transcript_embeddings (
    embedding_id  TEXT PRIMARY KEY,
    asset_id      TEXT NOT NULL,
    version_id    TEXT NOT NULL,
    segment_id    TEXT NOT NULL,
    embedding     BLOB NOT NULL,
    model         TEXT NOT NULL,
    dimension     INTEGER NOT NULL,
    visibility    TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    UNIQUE (asset_id, version_id, segment_id)
);

CREATE INDEX IF NOT EXISTS idx_embeddings_visibility
    ON transcript_embeddings (visibility, asset_id);

CREATE TABLE IF NOT EXISTS transcription_jobs (
    job_id           TEXT PRIMARY KEY,
    asset_id         TEXT NOT NULL,
    version_id       TEXT NOT NULL,
    engine_policy    TEXT NOT NULL,
    attempt          INTEGER NOT NULL,
    idempotency_key  TEXT NOT NULL UNIQUE,
    status           TEXT NOT NULL,
    enqueued_at      TEXT NOT NULL,
    scheduled_at     TEXT NOT NULL,
    started_at       TEXT,
    completed_at     TEXT,
    last_error       TEXT
);

CREATE TABLE IF NOT EXISTS dlq_items (
    dlq_id           TEXT PRIMARY KEY,
    job_id           TEXT NOT NULL,
    asset_id         TEXT NOT NULL,
    version_id       TEXT NOT NULL,
    error_code       TEXT NOT NULL,
    error_message    TEXT NOT NULL,
    error_retryable  INTEGER NOT NULL,
    job_data         TEXT NOT NULL,
    logs             TEXT NOT NULL,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_dlq_asset ON dlq_items (asset_id, created_at);
"#;
