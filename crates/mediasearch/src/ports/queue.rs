//! Job queue contract.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::PipelineError;
use crate::models::{TerminalError, TranscriptionJob};

/// Delayed-delivery FIFO with ack/nack semantics and at-least-once delivery.
///
/// Delivery ordering is not guaranteed; uniqueness is enforced by the
/// job's idempotency key (duplicate enqueues with the same key are no-ops).
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: TranscriptionJob) -> Result<(), PipelineError>;

    async fn enqueue_delayed(
        &self,
        job: TranscriptionJob,
        delay: Duration,
    ) -> Result<(), PipelineError>;

    /// Begin consuming. Jobs flow on the returned channel; each delivered
    /// job must be settled with `ack`, `nack`, or `move_to_dlq`.
    async fn consume(&self) -> Result<mpsc::Receiver<TranscriptionJob>, PipelineError>;

    /// Settle a delivered job as done.
    async fn ack(&self, job_id: &str) -> Result<(), PipelineError>;

    /// Return a delivered job to pending for redelivery.
    async fn nack(&self, job_id: &str) -> Result<(), PipelineError>;

    /// Drop a delivered job from the in-flight set; the caller has parked
    /// it durably (see `MediaDatabase::dlq_add`).
    async fn move_to_dlq(
        &self,
        job_id: &str,
        error: &TerminalError,
    ) -> Result<(), PipelineError>;

    /// Pending + scheduled depth (operational visibility).
    async fn depth(&self) -> Result<usize, PipelineError>;
}
