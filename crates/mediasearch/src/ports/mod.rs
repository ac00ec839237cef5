//! Port contracts the pipeline consumes.
//!
//! The core depends only on these traits; storage and compute backends
//! swap behind them without touching pipeline code. The local adapters in
//! this crate (`repository`, `storage`, `queue`) and the engine backends
//! in `mediasearch-engines` are the reference implementations.

mod asr;
mod database;
mod embedder;
mod object_store;
mod queue;

pub use asr::{AsrResult, AsrSegment, EngineCapabilities, SpeechEngine, TranscribeOptions};
pub use database::{IngestOutcome, MediaDatabase, SegmentHit};
pub use embedder::Embedder;
pub use object_store::{ObjectEvent, ObjectEventKind, ObjectMeta, ObjectStore};
pub use queue::JobQueue;
