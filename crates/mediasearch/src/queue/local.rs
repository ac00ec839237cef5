//! In-process delayed job queue.
//!
//! A min-heap of scheduled jobs feeds a dispatcher task that releases work
//! when due. Delivery is at-least-once: a delivered job stays in the
//! in-flight set until acked, and a nack returns it to pending
//! immediately. Idempotency keys dedup duplicate enqueues.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::models::{TerminalError, TranscriptionJob};
use crate::ports::JobQueue;

const DELIVERY_CHANNEL_CAPACITY: usize = 64;

struct Scheduled {
    due: Instant,
    job: TranscriptionJob,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due
    }
}
impl Eq for Scheduled {}
impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.due.cmp(&other.due)
    }
}

#[derive(Default)]
struct QueueState {
    pending: BinaryHeap<Reverse<Scheduled>>,
    in_flight: HashMap<String, TranscriptionJob>,
    seen_keys: HashSet<String>,
    consuming: bool,
    closed: bool,
}

/// Tokio-native queue adapter for the local backend.
#[derive(Clone)]
pub struct LocalJobQueue {
    state: Arc<Mutex<QueueState>>,
    wake: Arc<Notify>,
}

impl Default for LocalJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalJobQueue {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Stop accepting new work. Pending jobs still drain.
    pub fn close(&self) {
        self.state.lock().expect("queue lock").closed = true;
        self.wake.notify_one();
    }

    fn push(&self, job: TranscriptionJob, delay: Duration) -> Result<(), PipelineError> {
        let mut state = self.state.lock().expect("queue lock");
        if state.closed {
            return Err(PipelineError::TransientResource("queue is closed".into()));
        }
        if state.seen_keys.contains(&job.idempotency_key) {
            debug!(
                idempotency_key = %job.idempotency_key,
                "duplicate enqueue suppressed"
            );
            return Ok(());
        }
        state.seen_keys.insert(job.idempotency_key.clone());
        state.pending.push(Reverse(Scheduled {
            due: Instant::now() + delay,
            job,
        }));
        drop(state);
        self.wake.notify_one();
        Ok(())
    }
}

#[async_trait]
impl JobQueue for LocalJobQueue {
    async fn enqueue(&self, job: TranscriptionJob) -> Result<(), PipelineError> {
        self.push(job, Duration::ZERO)
    }

    async fn enqueue_delayed(
        &self,
        job: TranscriptionJob,
        delay: Duration,
    ) -> Result<(), PipelineError> {
        self.push(job, delay)
    }

    async fn consume(&self) -> Result<mpsc::Receiver<TranscriptionJob>, PipelineError> {
        {
            let mut state = self.state.lock().expect("queue lock");
            if state.consuming {
                return Err(PipelineError::InvalidInput(
                    "queue already has a consumer".into(),
                ));
            }
            state.consuming = true;
        }

        let (tx, rx) = mpsc::channel(DELIVERY_CHANNEL_CAPACITY);
        let state = Arc::clone(&self.state);
        let wake = Arc::clone(&self.wake);

        tokio::spawn(async move {
            loop {
                // Release everything due; find the next deadline.
                let (ready, next_due) = {
                    let mut guard = state.lock().expect("queue lock");
                    let now = Instant::now();
                    let mut ready = Vec::new();
                    while guard
                        .pending
                        .peek()
                        .is_some_and(|Reverse(s)| s.due <= now)
                    {
                        let Reverse(scheduled) = guard.pending.pop().expect("peeked");
                        guard
                            .in_flight
                            .insert(scheduled.job.job_id.clone(), scheduled.job.clone());
                        ready.push(scheduled.job);
                    }
                    let next_due = guard.pending.peek().map(|Reverse(s)| s.due);
                    (ready, next_due)
                };

                for job in ready {
                    if tx.send(job).await.is_err() {
                        // Consumer gone; stop dispatching.
                        state.lock().expect("queue lock").consuming = false;
                        return;
                    }
                }

                match next_due {
                    Some(due) => {
                        tokio::select! {
                            _ = tokio::time::sleep_until(due) => {}
                            _ = wake.notified() => {}
                        }
                    }
                    None => wake.notified().await,
                }
            }
        });

        Ok(rx)
    }

    async fn ack(&self, job_id: &str) -> Result<(), PipelineError> {
        let mut state = self.state.lock().expect("queue lock");
        if state.in_flight.remove(job_id).is_none() {
            warn!(job_id, "ack for unknown job");
        }
        Ok(())
    }

    async fn nack(&self, job_id: &str) -> Result<(), PipelineError> {
        let mut state = self.state.lock().expect("queue lock");
        let Some(job) = state.in_flight.remove(job_id) else {
            warn!(job_id, "nack for unknown job");
            return Ok(());
        };
        state.pending.push(Reverse(Scheduled {
            due: Instant::now(),
            job,
        }));
        drop(state);
        self.wake.notify_one();
        Ok(())
    }

    async fn move_to_dlq(
        &self,
        job_id: &str,
        error: &TerminalError,
    ) -> Result<(), PipelineError> {
        let mut state = self.state.lock().expect("queue lock");
        if state.in_flight.remove(job_id).is_none() {
            warn!(job_id, "move_to_dlq for unknown job");
        }
        debug!(job_id, code = %error.code, "job parked to DLQ");
        Ok(())
    }

    async fn depth(&self) -> Result<usize, PipelineError> {
        Ok(self.state.lock().expect("queue lock").pending.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EnginePolicy;

    fn job(attempt: u32) -> TranscriptionJob {
        TranscriptionJob::new("a1", "v_1", EnginePolicy::new("whisper", 600), attempt)
    }

    #[tokio::test]
    async fn delivers_enqueued_job() {
        let queue = LocalJobQueue::new();
        let mut rx = queue.consume().await.unwrap();
        let j = job(0);
        queue.enqueue(j.clone()).await.unwrap();
        let delivered = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered.job_id, j.job_id);
        queue.ack(&delivered.job_id).await.unwrap();
        assert_eq!(queue.depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_is_noop() {
        let queue = LocalJobQueue::new();
        let j = job(0);
        queue.enqueue(j.clone()).await.unwrap();
        queue.enqueue(j.clone()).await.unwrap();
        let other = job(0);
        // Same key, distinct job_id: still suppressed.
        queue.enqueue(other).await.unwrap();
        assert_eq!(queue.depth().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delayed_jobs_wait_their_turn() {
        let queue = LocalJobQueue::new();
        let mut rx = queue.consume().await.unwrap();
        let slow = job(1);
        let fast = job(2);
        queue
            .enqueue_delayed(slow.clone(), Duration::from_millis(150))
            .await
            .unwrap();
        queue.enqueue(fast.clone()).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.job_id, fast.job_id);
        let started = Instant::now();
        let second = rx.recv().await.unwrap();
        assert_eq!(second.job_id, slow.job_id);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn nack_redelivers() {
        let queue = LocalJobQueue::new();
        let mut rx = queue.consume().await.unwrap();
        queue.enqueue(job(0)).await.unwrap();
        let first = rx.recv().await.unwrap();
        queue.nack(&first.job_id).await.unwrap();
        let again = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.job_id, first.job_id);
    }

    #[tokio::test]
    async fn closed_queue_rejects_enqueue() {
        let queue = LocalJobQueue::new();
        queue.close();
        let err = queue.enqueue(job(0)).await.unwrap_err();
        assert!(matches!(err, PipelineError::TransientResource(_)));
    }

    #[tokio::test]
    async fn second_consumer_rejected() {
        let queue = LocalJobQueue::new();
        let _rx = queue.consume().await.unwrap();
        assert!(queue.consume().await.is_err());
    }
}
