//! Domain models for assets, transcript data, jobs, and the dead-letter queue.

mod asset;
mod dlq;
mod job;
mod segment;

pub use asset::{
    derive_version_id, Asset, AssetStatus, AssetVersion, PublishState, TriageState, VersionStatus,
};
pub use dlq::{DlqItem, TerminalError};
pub use job::{ChunkingStrategy, EnginePolicy, ExecutionMode, JobStatus, TranscriptionJob};
pub use segment::{TranscriptEmbedding, TranscriptSegment, Visibility};
